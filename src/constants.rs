// src/constants.rs

/// The key under which positional arguments are collected.
pub const POSITIONALS_KEY: &str = "_";

/// The key under which the environment snapshot is attached to task options.
pub const ENV_KEY: &str = "env";

/// Option names that can never be supplied on the command line nor listed as
/// user-declared schema fields.
pub const RESERVED_NAMES: [&str; 2] = [POSITIONALS_KEY, ENV_KEY];

/// The token that ends option parsing.
pub const OPTION_TERMINATOR: &str = "--";

/// Default directory (relative to the working directory) holding task files.
pub const DEFAULT_TASK_DIRECTORY: &str = "scripts";

/// The name of the project-level configuration file (in the working directory).
pub const PROJECT_CONFIG_FILENAME: &str = "hr.toml";

/// The name of the global configuration file (in `~/.config/hr/`).
pub const GLOBAL_CONFIG_FILENAME: &str = "config.toml";

/// The directory name used under the system config directory.
pub const GLOBAL_CONFIG_DIR: &str = "hr";

/// Extensions accepted for task files, in resolution order.
pub const TASK_FILE_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Environment variable overriding the task directory.
pub const ENV_TASK_DIRECTORY: &str = "HR_TASK_DIRECTORY";

/// Environment variable overriding the quiet flag.
pub const ENV_QUIET: &str = "HR_QUIET";

/// Returns `true` if `name` is one of the [`RESERVED_NAMES`].
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}
