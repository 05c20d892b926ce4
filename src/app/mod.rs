pub mod enrich_use_case;
pub mod ports;
#[cfg(test)]
pub(crate) mod test_support;

pub use enrich_use_case::{BatchHandle, EnrichUseCase, PersistMode};
