pub mod continuation;
pub mod options;
pub mod page;
pub mod record;
