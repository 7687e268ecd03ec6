pub const HEADS_PREFIX: &str = "refs/heads/";
pub const REMOTES_PREFIX: &str = "refs/remotes/origin/";

pub fn add_prefix(name: &str) -> String {
    format!("{HEADS_PREFIX}{name}")
}

pub fn trim_prefix(name: &str) -> &str {
    name.strip_prefix(HEADS_PREFIX)
        .or_else(|| name.strip_prefix(REMOTES_PREFIX))
        .unwrap_or(name)
}
