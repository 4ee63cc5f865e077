//! Persistence: key-value catalog store and Parquet snapshot contents

pub mod snapshot;
pub mod store;
