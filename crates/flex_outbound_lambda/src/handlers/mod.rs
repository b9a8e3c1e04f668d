pub mod cleanup;
pub mod initiate;
