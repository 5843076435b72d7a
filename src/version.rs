//! Build metadata stamped by build.rs.

/// `--version` text: package version, commit, build date and compiler.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("LIBRARIAN_COMMIT_SHA"),
    " ",
    env!("LIBRARIAN_BUILD_DATE"),
    ") rustc ",
    env!("LIBRARIAN_RUSTC_VERSION")
);

/// Sent with outbound webhook requests.
pub fn user_agent() -> String {
    format!(
        "librarian/{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("LIBRARIAN_COMMIT_SHA")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_version_leads_with_package_version() {
        assert!(LONG_VERSION.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(LONG_VERSION.contains(" rustc "));
    }

    #[test]
    fn user_agent_names_the_tool() {
        assert!(user_agent().starts_with("librarian/"));
    }
}
