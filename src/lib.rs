pub mod config;
pub mod ring;

pub use ring::{Crc32, KeyHasher, Ring, RingError, SharedRing, DEFAULT_VIRTUAL_NODES};

pub mod utils {
    /// Renders the identity of one virtual node: `"<node>#<replica>"`.
    pub fn virtual_key<S>(node: S, replica: usize) -> String
    where
        S: AsRef<str>,
    {
        format!("{}#{}", node.as_ref(), replica)
    }

    /// CRC-32 (IEEE) checksum of the key, i.e. its position on the circle.
    pub fn hash_key<K>(key: K) -> u32
    where
        K: AsRef<[u8]>,
    {
        crc32fast::hash(key.as_ref())
    }

}
