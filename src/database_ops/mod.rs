pub mod db;
pub mod load;
pub mod schema;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;
