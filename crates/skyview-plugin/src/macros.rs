//! Macros for plugin crates.

/// Builds the [`PluginMetadata`](crate::registry::PluginMetadata) a plugin
/// returns from `Plugin::metadata`.
///
/// ```rust,ignore
/// plugin_metadata!(name: "Clock", version: "0.3.0", description: "Wall-clock overlay", author: "Skyview Team")
/// ```
///
/// With only `name` and `description`, version and authors come from the
/// invoking crate's `Cargo.toml`.
#[macro_export]
macro_rules! plugin_metadata {
    (name: $name:expr, version: $version:expr, description: $desc:expr, author: $author:expr $(,)?) => {
        $crate::registry::PluginMetadata::new($name, $version, $desc, $author)
    };
    (name: $name:expr, description: $desc:expr $(,)?) => {
        $crate::registry::PluginMetadata::new(
            $name,
            env!("CARGO_PKG_VERSION"),
            $desc,
            env!("CARGO_PKG_AUTHORS"),
        )
    };
}
