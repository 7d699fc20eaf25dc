pub mod interface;
pub mod memory;
pub mod noop;
use crate::config::Config;
use ::anyhow::Result;

pub fn make_provider(
    config: &Config,
) -> Result<::std::sync::Arc<dyn interface::CacheStore>> {
    match config.cache_interface.as_str() {
        "memory" => {
            let capacity = ::std::num::NonZeroUsize::new(config.cache_capacity)
                .ok_or_else(|| {
                    anyhow::anyhow!("CACHE_CAPACITY must be greater than zero")
                })?;
            ::log::info!("In-process cache with capacity {}", capacity);
            Ok(::std::sync::Arc::new(memory::MemoryProvider::new(capacity)))
        }
        "noop" => {
            ::log::info!("No cache provider selected");
            Ok(::std::sync::Arc::new(noop::NoopProvider::new()))
        }
        interface => {
            Err(anyhow::anyhow!("Unknown cache interface: {}", interface))
        }
    }
}
