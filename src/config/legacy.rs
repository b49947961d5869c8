//! Flat environment-variable configuration.
//!
//! Reads the `PROJECT_COUNT` / `PROJECT_{i}_*` / `CLOUD_DB_*` variables used by
//! existing deployments, optionally from a `.env` file in the working
//! directory. Projects with missing required values are skipped with a
//! warning and never reach the poller.

use std::collections::HashSet;

use tracing::{info, warn};

use super::{Config, ConfigError, ConnectionConfig, Dialect, ProjectConfig, SinkConfig};

/// Number of configured projects.
pub const PROJECT_COUNT_ENV_VAR: &str = "PROJECT_COUNT";
/// Prefix of per-project variables; followed by the 1-based index and `_`.
pub const PROJECT_ENV_PREFIX: &str = "PROJECT_";
/// Prefix of sink connection variables.
pub const SINK_ENV_PREFIX: &str = "CLOUD_DB_";

/// Load from the process environment, after merging `.env` if present.
pub fn from_env() -> Result<Config, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "Loaded environment file");
    }
    from_lookup(|key| std::env::var(key).ok())
}

/// Load using an arbitrary variable lookup.
pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let count: usize = match lookup(PROJECT_COUNT_ENV_VAR) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("{PROJECT_COUNT_ENV_VAR} is not a number: {raw}"))
        })?,
        None => 0,
    };
    info!(count, "Detected {}", PROJECT_COUNT_ENV_VAR);

    let mut projects = Vec::with_capacity(count);
    for index in 1..=count {
        if let Some(project) = load_project(&lookup, index)? {
            projects.push(project);
        }
    }

    Ok(Config {
        sink: load_sink(&lookup)?,
        projects,
        ..Config::default()
    })
}

fn load_project<F>(lookup: &F, index: usize) -> Result<Option<ProjectConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = format!("{PROJECT_ENV_PREFIX}{index}_");
    let var = |suffix: &str| {
        lookup(&format!("{prefix}{suffix}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let name = var("NAME");
    let database = var("DB_NAME");
    let host = var("DB_HOST");
    let user = var("DB_USER");
    let password = var("DB_PASSWORD");
    let tables = parse_tables(var("TABLES").as_deref().unwrap_or(""));

    let dialect = match var("DB_TYPE") {
        None => Dialect::Mysql,
        Some(raw) => Dialect::parse(&raw).unwrap_or_else(|| {
            warn!(project = index, db_type = %raw, "Unknown database type, assuming mysql");
            Dialect::Mysql
        }),
    };

    let port = var("DB_PORT")
        .map(|raw| {
            raw.parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("{prefix}DB_PORT is not a port: {raw}")))
        })
        .transpose()?;

    info!(
        project = index,
        name = name.as_deref().unwrap_or(""),
        db_name = database.as_deref().unwrap_or(""),
        db_host = host.as_deref().unwrap_or(""),
        db_user = user.as_deref().unwrap_or(""),
        db_password = if password.is_some() { "SET" } else { "MISSING" },
        tables = ?tables,
        db_type = %dialect,
        "Loading project"
    );

    let networked = dialect != Dialect::Sqlite;
    let complete = name.is_some()
        && database.is_some()
        && !tables.is_empty()
        && (!networked || (host.is_some() && user.is_some() && password.is_some()));
    if !complete {
        warn!(project = index, "Skipping project due to missing required values");
        return Ok(None);
    }

    Ok(Some(ProjectConfig {
        name: name.unwrap_or_default(),
        dialect,
        connection: ConnectionConfig {
            host: host.unwrap_or_default(),
            port,
            user: user.unwrap_or_default(),
            password: password.unwrap_or_default(),
            database: database.unwrap_or_default(),
        },
        tables,
    }))
}

fn load_sink<F>(lookup: &F) -> Result<Option<SinkConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| lookup(&format!("{SINK_ENV_PREFIX}{suffix}"));

    let Some(host) = var("HOST") else {
        return Ok(None);
    };

    let port = var("PORT")
        .map(|raw| {
            raw.trim().parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("{SINK_ENV_PREFIX}PORT is not a port: {raw}"))
            })
        })
        .transpose()?;

    Ok(Some(SinkConfig {
        dialect: Dialect::Mysql,
        connection: ConnectionConfig {
            host,
            port,
            user: var("USER").unwrap_or_default(),
            password: var("PASSWORD").unwrap_or_default(),
            database: var("NAME").unwrap_or_default(),
        },
    }))
}

/// Split a comma-separated table list, trimming entries and dropping empty
/// ones. Repeats keep their first position.
pub fn parse_tables(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && seen.insert(*t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn fleet_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("PROJECT_COUNT", "1"),
            ("PROJECT_1_NAME", "Fleet"),
            ("PROJECT_1_DB_NAME", "fleet"),
            ("PROJECT_1_DB_HOST", "10.0.0.5"),
            ("PROJECT_1_DB_USER", "monitor"),
            ("PROJECT_1_DB_PASSWORD", "secret"),
            ("PROJECT_1_TABLES", "vehicles, drivers,,"),
        ]
    }

    #[test]
    fn test_parse_tables() {
        assert_eq!(parse_tables(" a , b,,c "), vec!["a", "b", "c"]);
        assert!(parse_tables("").is_empty());
        assert!(parse_tables(" , ").is_empty());
    }

    #[test]
    fn test_parse_tables_drops_repeats() {
        assert_eq!(
            parse_tables("vehicles, drivers, vehicles ,drivers"),
            vec!["vehicles", "drivers"]
        );
    }

    #[test]
    fn test_loads_complete_project() {
        let config = from_lookup(lookup_from(&fleet_vars())).unwrap();

        assert_eq!(config.projects.len(), 1);
        let project = &config.projects[0];
        assert_eq!(project.name, "Fleet");
        assert_eq!(project.dialect, Dialect::Mysql);
        assert_eq!(project.tables, vec!["vehicles", "drivers"]);
        assert_eq!(project.connection.database, "fleet");
        assert_eq!(project.connection.port, None);
        assert_eq!(project.connection.port_or_default(project.dialect), 3306);
    }

    #[test]
    fn test_skips_project_missing_password() {
        let vars: Vec<_> = fleet_vars()
            .into_iter()
            .filter(|(k, _)| *k != "PROJECT_1_DB_PASSWORD")
            .collect();
        let config = from_lookup(lookup_from(&vars)).unwrap();
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_skips_project_with_only_blank_tables() {
        let mut vars = fleet_vars();
        vars.retain(|(k, _)| *k != "PROJECT_1_TABLES");
        vars.push(("PROJECT_1_TABLES", " , "));
        let config = from_lookup(lookup_from(&vars)).unwrap();
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_postgres_project_and_port() {
        let mut vars = fleet_vars();
        vars.push(("PROJECT_1_DB_TYPE", "Postgres"));
        vars.push(("PROJECT_1_DB_PORT", "6543"));
        let config = from_lookup(lookup_from(&vars)).unwrap();

        let project = &config.projects[0];
        assert_eq!(project.dialect, Dialect::Postgres);
        assert_eq!(project.connection.port, Some(6543));
    }

    #[test]
    fn test_sqlite_project_needs_no_credentials() {
        let vars = [
            ("PROJECT_COUNT", "1"),
            ("PROJECT_1_NAME", "Local"),
            ("PROJECT_1_DB_NAME", "/var/lib/local.db"),
            ("PROJECT_1_DB_TYPE", "sqlite"),
            ("PROJECT_1_TABLES", "jobs"),
        ];
        let config = from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].dialect, Dialect::Sqlite);
    }

    #[test]
    fn test_invalid_port_is_error() {
        let mut vars = fleet_vars();
        vars.push(("PROJECT_1_DB_PORT", "not-a-port"));
        assert!(matches!(
            from_lookup(lookup_from(&vars)),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_project_count_is_error() {
        let vars = [("PROJECT_COUNT", "two")];
        assert!(from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn test_sink_from_cloud_vars() {
        let mut vars = fleet_vars();
        vars.extend([
            ("CLOUD_DB_HOST", "metrics.internal"),
            ("CLOUD_DB_USER", "writer"),
            ("CLOUD_DB_PASSWORD", "pw"),
            ("CLOUD_DB_NAME", "metrics"),
            ("CLOUD_DB_PORT", "3307"),
        ]);
        let config = from_lookup(lookup_from(&vars)).unwrap();

        let sink = config.sink.expect("sink configured");
        assert_eq!(sink.dialect, Dialect::Mysql);
        assert_eq!(sink.connection.host, "metrics.internal");
        assert_eq!(sink.connection.port, Some(3307));
        assert_eq!(sink.connection.database, "metrics");
    }

    #[test]
    fn test_no_sink_without_host() {
        let config = from_lookup(lookup_from(&fleet_vars())).unwrap();
        assert!(config.sink.is_none());
    }
}
