mod metadata_lookup;

pub use metadata_lookup::*;
