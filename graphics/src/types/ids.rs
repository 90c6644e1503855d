//! Process-unique identifiers for graphics objects.
//!
//! Identifiers are what the bind context records, so tests and tools can
//! tell which object a command came from without holding the object.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Allocate a fresh identifier.
            pub(crate) fn next() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Raw numeric value.
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies a [`Shader`](crate::shader::Shader).
    ShaderId
);
define_id!(
    /// Identifies a vertex or index buffer.
    BufferId
);
define_id!(
    /// Identifies a [`Texture`](crate::resources::Texture).
    TextureId
);
define_id!(
    /// Identifies a [`Material`](crate::materials::Material).
    MaterialId
);
define_id!(
    /// Identifies a [`MaterialInstance`](crate::materials::MaterialInstance).
    InstanceId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = MaterialId::next();
        let b = MaterialId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
