//! Command line arguments and their translation into a [`Query`].

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use cmr_api::Transport;
use cmr_search::{ParamValue, Query};
use cmr_types::{EntityKind, Environment};

use crate::config::CliConfig;

/// Records printed when neither `--limit` nor `--all` is given.
pub const DEFAULT_LIMIT: u64 = 10;
/// Page size for `--stream` when neither the flag nor the config sets one.
pub const DEFAULT_STREAM_PAGE_SIZE: u64 = 100;

#[derive(Debug, Parser)]
#[command(name = "cmr", about = "Search the NASA Common Metadata Repository")]
#[command(group(ArgGroup::new("mode").args(["limit", "all", "hits", "stream", "dry_run"])))]
#[command(group(ArgGroup::new("credential").args(["token", "bearer_token"])))]
pub struct Cli {
    /// collections, granules, tools, services or variables
    pub entity: EntityKind,

    /// Filter by NAME; commas split VALUE into positional arguments (repeatable)
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Set an option qualifier, e.g. short_name.pattern=true (repeatable)
    #[arg(long = "option", value_name = "PARAM.KEY=BOOL")]
    pub options: Vec<String>,

    #[arg(long)]
    pub short_name: Option<String>,

    #[arg(long)]
    pub version: Option<String>,

    /// Concept id (repeatable)
    #[arg(long = "concept-id")]
    pub concept_ids: Vec<String>,

    /// START,END; either side may be empty
    #[arg(long, value_name = "START,END")]
    pub temporal: Option<String>,

    #[arg(long, value_name = "LON,LAT", allow_hyphen_values = true)]
    pub point: Option<String>,

    #[arg(long, value_name = "W,S,E,N", allow_hyphen_values = true)]
    pub bounding_box: Option<String>,

    /// Response format, e.g. json, echo10, umm_json_v1_17
    #[arg(long)]
    pub format: Option<String>,

    /// Target environment: ops, uat or sit
    #[arg(long = "env")]
    pub environment: Option<Environment>,

    #[arg(long)]
    pub token: Option<String>,

    #[arg(long)]
    pub bearer_token: Option<String>,

    /// Maximum number of items to fetch
    #[arg(long)]
    pub limit: Option<u64>,

    /// Fetch every matching item
    #[arg(long)]
    pub all: bool,

    /// Print only the number of matching items
    #[arg(long)]
    pub hits: bool,

    /// Print items as pages arrive
    #[arg(long)]
    pub stream: bool,

    #[arg(long, requires = "stream")]
    pub page_size: Option<u64>,

    /// Print the first request instead of sending it
    #[arg(long)]
    pub dry_run: bool,
}

/// What the command should do once the query is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Get(u64),
    GetAll,
    Hits,
    Stream(u64),
    DryRun,
}

impl Cli {
    pub fn action(&self, config: &CliConfig) -> Action {
        if self.dry_run {
            Action::DryRun
        } else if self.hits {
            Action::Hits
        } else if self.all {
            Action::GetAll
        } else if self.stream {
            Action::Stream(
                self.page_size
                    .or(config.page_size)
                    .unwrap_or(DEFAULT_STREAM_PAGE_SIZE),
            )
        } else {
            Action::Get(self.limit.unwrap_or(DEFAULT_LIMIT))
        }
    }

    /// Build the query described by the flags, layered over `config`.
    pub fn build_query(&self, config: &CliConfig, transport: Arc<dyn Transport>) -> Result<Query> {
        let mut query = Query::with_transport(self.entity, transport);
        query.mode(self.environment.or(config.environment).unwrap_or_default());

        if let Some(format) = &self.format {
            query.format(format)?;
        }

        match (&self.token, &self.bearer_token) {
            (Some(token), _) => {
                query.token(token)?;
            }
            (None, Some(token)) => {
                query.bearer_token(token)?;
            }
            (None, None) => {
                if let Some(token) = &config.bearer_token {
                    query.bearer_token(token)?;
                } else if let Some(token) = &config.token {
                    query.token(token)?;
                }
            }
        }

        if let Some(short_name) = &self.short_name {
            query.short_name(short_name.as_str())?;
        }
        if let Some(version) = &self.version {
            query.version(version.as_str())?;
        }
        if !self.concept_ids.is_empty() {
            query.concept_id(self.concept_ids.clone())?;
        }
        if let Some(range) = &self.temporal {
            let (start, end) = range.split_once(',').unwrap_or((range.as_str(), ""));
            query.temporal(start, end)?;
        }
        if let Some(point) = &self.point {
            query.set("point", split_values(point))?;
        }
        if let Some(bounding_box) = &self.bounding_box {
            query.set("bounding_box", split_values(bounding_box))?;
        }

        for param in &self.params {
            let (name, value) = param
                .split_once('=')
                .with_context(|| format!("expected NAME=VALUE, got '{param}'"))?;
            query
                .set(name.trim(), split_values(value))
                .with_context(|| format!("invalid --param '{param}'"))?;
        }

        for option in &self.options {
            let (target, value) = option
                .split_once('=')
                .with_context(|| format!("expected PARAM.KEY=BOOL, got '{option}'"))?;
            let (parameter, key) = target
                .rsplit_once('.')
                .with_context(|| format!("expected PARAM.KEY=BOOL, got '{option}'"))?;
            let flag = match value.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                other => bail!("option value must be true or false, got '{other}'"),
            };
            query.option(parameter.trim(), key.trim(), flag)?;
        }

        Ok(query)
    }
}

/// `a,b,c` becomes three positional arguments; a value without commas stays whole.
fn split_values(raw: &str) -> Vec<ParamValue> {
    raw.split(',').map(|part| ParamValue::from(part.trim())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmr_api::{SearchRequest, SearchResponse, TransportError};

    struct Offline;

    impl Transport for Offline {
        fn send(&self, _: &SearchRequest) -> Result<SearchResponse, TransportError> {
            Err(TransportError::unavailable("offline"))
        }
    }

    fn parse(arguments: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cmr").chain(arguments.iter().copied())).expect("valid arguments")
    }

    fn first_request(cli: &Cli, config: &CliConfig) -> SearchRequest {
        cli.build_query(config, Arc::new(Offline))
            .and_then(|query| Ok(query.request(DEFAULT_LIMIT)?))
            .expect("request")
    }

    #[test]
    fn flags_become_query_parameters() {
        let cli = parse(&[
            "granules",
            "--short-name",
            "AST_L1T",
            "--version",
            "003",
            "--temporal",
            "2016-10-10,",
            "--point",
            "-101.25,42.5",
            "--param",
            "cloud_cover=,50",
            "--option",
            "short_name.pattern=true",
        ]);
        let request = first_request(&cli, &CliConfig::default());

        assert_eq!(request.query_value("short_name"), Some("AST_L1T"));
        assert_eq!(request.query_value("version"), Some("003"));
        assert_eq!(request.query_value("temporal[]"), Some("2016-10-10T00:00:00Z,"));
        assert_eq!(request.query_value("point"), Some("-101.25,42.5"));
        assert_eq!(request.query_value("cloud_cover"), Some(",50"));
        assert_eq!(request.query_value("options[short_name][pattern]"), Some("true"));
    }

    #[test]
    fn config_supplies_environment_and_credentials() {
        let config = CliConfig {
            environment: Some(Environment::Uat),
            token: Some("legacy".into()),
            bearer_token: Some("edl".into()),
            ..CliConfig::default()
        };
        let request = first_request(&parse(&["collections"]), &config);
        assert!(request.url.as_str().starts_with("https://cmr.uat.earthdata.nasa.gov/"));
        assert_eq!(request.header("authorization"), Some("Bearer edl"));

        let request = first_request(&parse(&["collections", "--env", "ops", "--token", "flag"]), &config);
        assert!(request.url.as_str().starts_with("https://cmr.earthdata.nasa.gov/"));
        assert_eq!(request.header("authorization"), Some("flag"));
    }

    #[test]
    fn unknown_parameters_are_reported() {
        let cli = parse(&["tools", "--param", "cloud_cover=10"]);
        let error = cli
            .build_query(&CliConfig::default(), Arc::new(Offline))
            .expect_err("tools have no cloud cover");
        assert!(format!("{error:#}").contains("unknown parameter 'cloud_cover'"));
    }

    #[test]
    fn modes_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["cmr", "granules", "--all", "--hits"]).is_err());
        assert!(Cli::try_parse_from(["cmr", "granules", "--token", "a", "--bearer-token", "b"]).is_err());
        assert!(Cli::try_parse_from(["cmr", "granules", "--page-size", "5"]).is_err());
        assert!(Cli::try_parse_from(["cmr", "datasets"]).is_err());
    }

    #[test]
    fn actions_follow_flags_and_config() {
        let config = CliConfig {
            page_size: Some(250),
            ..CliConfig::default()
        };
        assert_eq!(parse(&["collections"]).action(&config), Action::Get(DEFAULT_LIMIT));
        assert_eq!(parse(&["collections", "--limit", "3"]).action(&config), Action::Get(3));
        assert_eq!(parse(&["collections", "--stream"]).action(&config), Action::Stream(250));
        assert_eq!(
            parse(&["collections", "--stream", "--page-size", "20"]).action(&config),
            Action::Stream(20)
        );
        assert_eq!(parse(&["collections", "--dry-run"]).action(&config), Action::DryRun);
    }
}
