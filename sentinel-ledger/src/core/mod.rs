pub mod integrity;
pub mod retry;
pub mod storage;
