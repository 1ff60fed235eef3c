use crate::fs::TxnOptions;
use crate::sharder::DEFAULT_ORDER;

/// Try budgets and protocol timing for a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub sharder_order: u32,
    pub append_tries: u64,
    pub read_tries: u64,
    pub trim_tries: u64,
    pub init_tries: u64,
    pub txn: TxnOptions,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sharder_order: DEFAULT_ORDER,
            append_tries: 10_000,
            read_tries: 1000,
            trim_tries: 1000,
            init_tries: 1000,
            txn: TxnOptions::default(),
        }
    }
}
