pub mod storage_roots;
