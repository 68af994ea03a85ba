use std::path::PathBuf;
use std::str::FromStr;

use super::CliError;

const MIN_SEARCH_QUERY_LEN: usize = 2;
const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Options shared by every command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub db_path: Option<PathBuf>,
    pub upload_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

/// Metadata supplied by hand when linking an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualLink {
    pub external_url: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    pub album_image_url: Option<String>,
    pub popularity: Option<u32>,
    pub preview_url: Option<String>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload {
        files: Vec<PathBuf>,
    },
    List,
    Analyze {
        ids: Vec<i64>,
        all: bool,
        workers: Option<u32>,
    },
    Recommend {
        upload_id: i64,
        k: Option<i64>,
        max_popularity: Option<i64>,
        page: Option<usize>,
        per_page: Option<usize>,
    },
    Similar {
        upload_id: i64,
        k: Option<i64>,
    },
    Link {
        upload_id: i64,
        external_id: String,
        /// Fetch every field from the metadata service instead of `manual`.
        fetch: bool,
        manual: ManualLink,
    },
    LinkSearch {
        upload_id: i64,
        query: String,
    },
    Search {
        query: String,
        limit: usize,
    },
    Config {
        init: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub global: GlobalOptions,
    pub command: Command,
}

/// Parse arguments (without the program name). `Ok(None)` means help was printed.
pub fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, CliError> {
    let mut global = GlobalOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--db" => global.db_path = Some(PathBuf::from(take_value(&args, &mut idx, "--db")?)),
            "--upload-dir" => {
                global.upload_dir = Some(PathBuf::from(take_value(&args, &mut idx, "--upload-dir")?))
            }
            "--config" => {
                global.config_path = Some(PathBuf::from(take_value(&args, &mut idx, "--config")?))
            }
            flag if flag.starts_with('-') => {
                return Err(usage(format!("Unknown argument: {flag}")));
            }
            command => {
                let rest = &args[idx + 1..];
                if rest.iter().any(|arg| arg == "-h" || arg == "--help") {
                    println!("{}", help_text());
                    return Ok(None);
                }
                let command = parse_command(command, rest)?;
                return Ok(Some(CliOptions { global, command }));
            }
        }
        idx += 1;
    }
    Err(usage("Missing command".to_string()))
}

fn parse_command(name: &str, args: &[String]) -> Result<Command, CliError> {
    match name {
        "upload" => {
            let files: Vec<PathBuf> = positionals(args, name)?.into_iter().map(PathBuf::from).collect();
            if files.is_empty() {
                return Err(usage("upload requires at least one file".to_string()));
            }
            Ok(Command::Upload { files })
        }
        "list" => {
            no_arguments(args, name)?;
            Ok(Command::List)
        }
        "analyze" => parse_analyze(args),
        "recommend" => parse_recommend(args),
        "similar" => {
            let mut upload_id = None;
            let mut k = None;
            let mut idx = 0usize;
            while idx < args.len() {
                match args[idx].as_str() {
                    "--k" => k = Some(parse_number("--k", take_value(args, &mut idx, "--k")?)?),
                    value => upload_id = Some(single_id(upload_id, value, name)?),
                }
                idx += 1;
            }
            Ok(Command::Similar {
                upload_id: required_id(upload_id, name)?,
                k,
            })
        }
        "link" => parse_link(args),
        "link-search" => {
            let words = positionals(args, name)?;
            let Some((id, query)) = words.split_first() else {
                return Err(usage("link-search requires an upload id and a query".to_string()));
            };
            Ok(Command::LinkSearch {
                upload_id: parse_number("upload id", id)?,
                query: search_query(query)?,
            })
        }
        "search" => {
            let mut limit = DEFAULT_SEARCH_LIMIT;
            let mut words = Vec::new();
            let mut idx = 0usize;
            while idx < args.len() {
                match args[idx].as_str() {
                    "--limit" => {
                        limit = parse_number("--limit", take_value(args, &mut idx, "--limit")?)?
                    }
                    flag if flag.starts_with("--") => {
                        return Err(usage(format!("Unknown argument for search: {flag}")));
                    }
                    word => words.push(word.to_string()),
                }
                idx += 1;
            }
            Ok(Command::Search {
                query: search_query(&words)?,
                limit: limit.max(1),
            })
        }
        "config" => {
            let mut init = false;
            for arg in args {
                match arg.as_str() {
                    "--init" => init = true,
                    other => return Err(usage(format!("Unknown argument for config: {other}"))),
                }
            }
            Ok(Command::Config { init })
        }
        other => Err(usage(format!("Unknown command: {other}"))),
    }
}

fn parse_analyze(args: &[String]) -> Result<Command, CliError> {
    let mut ids = Vec::new();
    let mut all = false;
    let mut workers = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--all" => all = true,
            "--workers" => {
                workers = Some(parse_number("--workers", take_value(args, &mut idx, "--workers")?)?)
            }
            flag if flag.starts_with("--") => {
                return Err(usage(format!("Unknown argument for analyze: {flag}")));
            }
            value => ids.push(parse_number("upload id", value)?),
        }
        idx += 1;
    }
    if ids.is_empty() && !all {
        return Err(usage("analyze requires upload ids or --all".to_string()));
    }
    Ok(Command::Analyze { ids, all, workers })
}

fn parse_recommend(args: &[String]) -> Result<Command, CliError> {
    let mut upload_id = None;
    let mut k = None;
    let mut max_popularity = None;
    let mut page = None;
    let mut per_page = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--k" => k = Some(parse_number("--k", take_value(args, &mut idx, "--k")?)?),
            "--max-popularity" => {
                max_popularity = Some(parse_number(
                    "--max-popularity",
                    take_value(args, &mut idx, "--max-popularity")?,
                )?)
            }
            "--page" => page = Some(parse_number("--page", take_value(args, &mut idx, "--page")?)?),
            "--per-page" => {
                per_page = Some(parse_number(
                    "--per-page",
                    take_value(args, &mut idx, "--per-page")?,
                )?)
            }
            value => upload_id = Some(single_id(upload_id, value, "recommend")?),
        }
        idx += 1;
    }
    Ok(Command::Recommend {
        upload_id: required_id(upload_id, "recommend")?,
        k,
        max_popularity,
        page,
        per_page,
    })
}

fn parse_link(args: &[String]) -> Result<Command, CliError> {
    let mut manual = ManualLink::default();
    let mut fetch = false;
    let mut positional = Vec::new();
    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        match flag {
            "--fetch" => fetch = true,
            "--url" => manual.external_url = Some(take_value(args, &mut idx, flag)?.to_string()),
            "--name" => manual.track_name = Some(take_value(args, &mut idx, flag)?.to_string()),
            "--artist" => manual.artist_name = Some(take_value(args, &mut idx, flag)?.to_string()),
            "--album" => manual.album_name = Some(take_value(args, &mut idx, flag)?.to_string()),
            "--album-image-url" => {
                manual.album_image_url = Some(take_value(args, &mut idx, flag)?.to_string())
            }
            "--popularity" => {
                manual.popularity = Some(parse_number(flag, take_value(args, &mut idx, flag)?)?)
            }
            "--preview-url" => {
                manual.preview_url = Some(take_value(args, &mut idx, flag)?.to_string())
            }
            "--duration-ms" => {
                manual.duration_ms = Some(parse_number(flag, take_value(args, &mut idx, flag)?)?)
            }
            other if other.starts_with("--") => {
                return Err(usage(format!("Unknown argument for link: {other}")));
            }
            value => positional.push(value.to_string()),
        }
        idx += 1;
    }
    let [id, external_id] = positional.as_slice() else {
        return Err(usage("link requires an upload id and an external track id".to_string()));
    };
    if fetch && manual != ManualLink::default() {
        return Err(usage("--fetch cannot be combined with manual fields".to_string()));
    }
    Ok(Command::Link {
        upload_id: parse_number("upload id", id)?,
        external_id: external_id.clone(),
        fetch,
        manual,
    })
}

fn take_value<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str, CliError> {
    *idx += 1;
    args.get(*idx)
        .map(String::as_str)
        .ok_or_else(|| usage(format!("{flag} requires a value")))
}

fn parse_number<T: FromStr>(label: &str, value: &str) -> Result<T, CliError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| usage(format!("Invalid value for {label}: {value}")))
}

fn positionals(args: &[String], command: &str) -> Result<Vec<String>, CliError> {
    if let Some(flag) = args.iter().find(|arg| arg.starts_with("--")) {
        return Err(usage(format!("Unknown argument for {command}: {flag}")));
    }
    Ok(args.to_vec())
}

fn no_arguments(args: &[String], command: &str) -> Result<(), CliError> {
    match args.first() {
        Some(extra) => Err(usage(format!("Unexpected argument for {command}: {extra}"))),
        None => Ok(()),
    }
}

fn single_id(current: Option<i64>, value: &str, command: &str) -> Result<i64, CliError> {
    if value.starts_with("--") {
        return Err(usage(format!("Unknown argument for {command}: {value}")));
    }
    if current.is_some() {
        return Err(usage(format!("{command} takes a single upload id")));
    }
    parse_number("upload id", value)
}

fn required_id(id: Option<i64>, command: &str) -> Result<i64, CliError> {
    id.ok_or_else(|| usage(format!("{command} requires an upload id")))
}

fn search_query(words: &[String]) -> Result<String, CliError> {
    let query = words.join(" ").trim().to_string();
    if query.chars().count() < MIN_SEARCH_QUERY_LEN {
        return Err(usage(format!(
            "Search query must be at least {MIN_SEARCH_QUERY_LEN} characters"
        )));
    }
    Ok(query)
}

fn usage(message: String) -> CliError {
    CliError::Usage(format!("{message}\n\n{}", help_text()))
}

pub fn help_text() -> String {
    [
        "soundalike",
        "",
        "Usage:",
        "  soundalike [--db <path>] [--upload-dir <dir>] [--config <path>] <command> [args]",
        "",
        "Commands:",
        "  upload <file>...                 Store audio files as new uploads",
        "  list                             List uploads",
        "  analyze <id>... | --all          Analyze uploads [--workers <n>]",
        "  recommend <id>                   Recommend similar uploads",
        "        [--k <n>] [--max-popularity <n>] [--page <n>] [--per-page <n>]",
        "  similar <id> [--k <n>]           List the most similar uploads",
        "  link <id> <track-id>             Link an upload to an external track",
        "        [--fetch] [--url <u>] [--name <s>] [--artist <s>] [--album <s>]",
        "        [--album-image-url <u>] [--popularity <n>] [--preview-url <u>] [--duration-ms <n>]",
        "  link-search <id> <query>...      Link an upload to the best search match",
        "  search <query>... [--limit <n>]  Search external tracks",
        "  config [--init]                  Show settings, or write them with --init",
    ]
    .join("\n")
}
