//! Library crate root re-exporting server and tool modules.

#[path = "lib/mod.rs"]
pub mod lib_mod;
pub use lib_mod as lib;
pub mod cli;
pub mod server;
pub mod tools;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    fn assert_split(label: &str, mod_path: &str, files: &[&str], needles: &[&str]) {
        for path in files {
            assert!(Path::new(path).exists(), "{label} layout: {path} must exist");
        }
        let content = fs::read_to_string(mod_path)
            .unwrap_or_else(|_| panic!("{label} layout: failed to read {mod_path}"));
        for needle in needles {
            assert!(
                content.contains(needle),
                "{label} layout: {mod_path} must declare {needle}"
            );
        }
    }

    #[test]
    fn runtime_layout_requires_split_modules() {
        assert_split(
            "runtime",
            "src/server/runtime/mod.rs",
            &[
                "src/server/runtime/startup.rs",
                "src/server/runtime/tool_registry.rs",
                "src/server/runtime/server_info.rs",
            ],
            &["startup", "tool_registry", "server_info"],
        );
    }

    #[test]
    fn cli_layout_requires_split_modules() {
        assert_split(
            "CLI",
            "src/cli/mod.rs",
            &[
                "src/cli/args.rs",
                "src/cli/profile.rs",
                "src/cli/client.rs",
                "src/cli/agent.rs",
            ],
            &["LaunchProfileArgs", "client", "agent"],
        );
    }

    #[test]
    fn config_layout_requires_split_modules() {
        assert_split(
            "config",
            "src/server/config/mod.rs",
            &[
                "src/server/config/server.rs",
                "src/server/config/storage.rs",
                "src/server/config/statistics.rs",
                "src/server/config/agent.rs",
                "src/server/config/telemetry.rs",
            ],
            &["server", "storage", "statistics", "agent", "telemetry"],
        );
    }

    #[test]
    fn tool_families_have_a_router() {
        for family in ["geometry", "crs", "vector", "raster", "stats"] {
            assert_split(
                family,
                &format!("src/tools/{family}/mod.rs"),
                &[
                    &format!("src/tools/{family}/router.rs"),
                    &format!("src/tools/{family}/request.rs"),
                ],
                &["mod router", "request"],
            );
        }
    }
}
