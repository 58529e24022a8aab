use rand::Rng;

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("hatchery/", env!("CARGO_PKG_VERSION"));

pub(crate) const DEFAULT_LISTEN: &str = "0.0.0.0:5557";

/// Node id used when a worker is started without `--node-id`.
///
/// Host name (when the environment exposes one), process id and a random
/// suffix, so two workers on one host never collide.
pub(crate) fn default_node_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "worker".to_owned());
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("{}-{}-{:08x}", host.trim(), std::process::id(), suffix)
}
