pub mod cursor;
pub mod error;
pub mod reader;
pub mod sink;

#[cfg(test)]
mod tests;
