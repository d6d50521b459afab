use std::fs;
use std::io::{self, Read};

use clap::{Args, Parser, Subcommand};
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use uuid::Uuid;

const SESSION_COOKIE: &str = "session_token";
const NO_QUERY: &[(&str, String)] = &[];

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; run `grantfinder signin` and set GRANTFINDER_SESSION_TOKEN")]
    MissingSessionToken,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("server did not return a session cookie")]
    NoSessionCookie,
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "grantfinder", about = "GrantFinder API CLI")]
struct Cli {
    #[arg(long, env = "GRANTFINDER_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "GRANTFINDER_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    session_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Sign in and print the session token.
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "GRANTFINDER_PASSWORD")]
        password: String,
    },
    Me,
    Grants(GrantsCommand),
    Details(DetailsCommand),
    Users(UsersCommand),
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long, help = "Deadline, YYYY-MM-DD")]
    date: Option<String>,
    #[arg(long = "type")]
    grant_type: Option<String>,
    #[arg(long)]
    assignee: Option<String>,
}

#[derive(Args, Debug)]
struct GrantsCommand {
    #[command(subcommand)]
    command: GrantsSubcommand,
}

#[derive(Subcommand, Debug)]
enum GrantsSubcommand {
    List(FilterArgs),
    Summary(FilterArgs),
    Show {
        grant_id: i64,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        grant_id: i64,
        #[arg(long)]
        data: String,
    },
    Delete {
        grant_id: i64,
    },
    /// Bulk upsert from a JSON array or JSONL file.
    Import {
        #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
        input: String,
    },
    Export {
        #[arg(long, default_value = "csv")]
        format: String,
        #[arg(long, help = "Output path; defaults to the server's filename")]
        output: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args, Debug)]
struct DetailsCommand {
    #[command(subcommand)]
    command: DetailsSubcommand,
}

#[derive(Subcommand, Debug)]
enum DetailsSubcommand {
    Show {
        grant_id: i64,
    },
    Set {
        grant_id: i64,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        reason_notes: String,
    },
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List,
    SetRole {
        user_id: Uuid,
        #[arg(value_parser = ["admin", "user"])]
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, session_token: cli.session_token };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Signin { email, password } => run_signin(&ctx, &email, &password).await,
        Command::Me => print_json(&api_request(&ctx, reqwest::Method::GET, "/api/auth/me", NO_QUERY, None).await?),
        Command::Grants(grants) => run_grants(&ctx, grants).await,
        Command::Details(details) => run_details(&ctx, details).await,
        Command::Users(users) => run_users(&ctx, users).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let response = client.get(api_url(cli, "/healthz")).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: "health check failed".to_owned() });
    }
    println!("ok");
    Ok(())
}

async fn run_signin(cli: &CliContext, email: &str, password: &str) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let response = client
        .post(api_url(cli, "/api/auth/signin"))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let value = response.json::<Value>().await.unwrap_or(Value::Null);
        return Err(server_error(status, &value));
    }

    let token = session_token(&response).ok_or(CliError::NoSessionCookie)?;
    println!("{token}");
    Ok(())
}

async fn run_grants(cli: &CliContext, grants: GrantsCommand) -> Result<(), CliError> {
    match grants.command {
        GrantsSubcommand::List(filter) => {
            print_json(&api_request(cli, reqwest::Method::GET, "/api/grants", &filter_pairs(&filter), None).await?)
        }
        GrantsSubcommand::Summary(filter) => {
            let pairs = filter_pairs(&filter);
            print_json(&api_request(cli, reqwest::Method::GET, "/api/grants/summary", &pairs, None).await?)
        }
        GrantsSubcommand::Show { grant_id } => {
            let path = format!("/api/grants/{grant_id}");
            print_json(&api_request(cli, reqwest::Method::GET, &path, NO_QUERY, None).await?)
        }
        GrantsSubcommand::Create { data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            print_json(&api_request(cli, reqwest::Method::POST, "/api/grants", NO_QUERY, Some(body)).await?)
        }
        GrantsSubcommand::Update { grant_id, data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            let path = format!("/api/grants/{grant_id}");
            print_json(&api_request(cli, reqwest::Method::PUT, &path, NO_QUERY, Some(body)).await?)
        }
        GrantsSubcommand::Delete { grant_id } => {
            let path = format!("/api/grants/{grant_id}");
            api_request(cli, reqwest::Method::DELETE, &path, NO_QUERY, None).await?;
            eprintln!("deleted grant {grant_id}");
            Ok(())
        }
        GrantsSubcommand::Import { input } => run_import(cli, &input).await,
        GrantsSubcommand::Export { format, output, filter } => run_export(cli, &format, output, &filter).await,
    }
}

async fn run_import(cli: &CliContext, input: &str) -> Result<(), CliError> {
    let raw = read_input(input)?;
    let (records, unreadable) = parse_import_records(&raw)?;
    if unreadable > 0 {
        eprintln!("skipped {unreadable} unreadable lines");
    }
    let body = serde_json::json!({ "grants": records });
    print_json(&api_request(cli, reqwest::Method::POST, "/api/grants/import", NO_QUERY, Some(body)).await?)
}

async fn run_export(cli: &CliContext, format: &str, output: Option<String>, filter: &FilterArgs) -> Result<(), CliError> {
    let mut pairs = vec![("format", format.to_owned())];
    pairs.extend(filter_pairs(filter));

    let client = authorized_client(cli)?;
    let response = prepare(&client, reqwest::Method::GET, &api_url(cli, "/api/grants/export"), &pairs, None)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let value = response.json::<Value>().await.unwrap_or(Value::Null);
        return Err(server_error(status, &value));
    }

    let suggested = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition);
    let target = output
        .or(suggested)
        .unwrap_or_else(|| format!("grants.{}", format.to_ascii_lowercase()));
    let bytes = response.bytes().await?;
    fs::write(&target, &bytes).map_err(|source| CliError::Io { path: target.clone(), source })?;
    eprintln!("wrote {} bytes to {target}", bytes.len());
    Ok(())
}

async fn run_details(cli: &CliContext, details: DetailsCommand) -> Result<(), CliError> {
    match details.command {
        DetailsSubcommand::Show { grant_id } => {
            let path = format!("/api/grants/{grant_id}/details");
            print_json(&api_request(cli, reqwest::Method::GET, &path, NO_QUERY, None).await?)
        }
        DetailsSubcommand::Set { grant_id, notes, category, reason_notes } => {
            let path = format!("/api/grants/{grant_id}/details");
            let body = serde_json::json!({ "notes": notes, "category": category, "reason_notes": reason_notes });
            print_json(&api_request(cli, reqwest::Method::PUT, &path, NO_QUERY, Some(body)).await?)
        }
    }
}

async fn run_users(cli: &CliContext, users: UsersCommand) -> Result<(), CliError> {
    match users.command {
        UsersSubcommand::List => {
            print_json(&api_request(cli, reqwest::Method::GET, "/api/admin/users", NO_QUERY, None).await?)
        }
        UsersSubcommand::SetRole { user_id, role } => {
            let path = format!("/api/admin/users/{user_id}/role");
            api_request(cli, reqwest::Method::PUT, &path, NO_QUERY, Some(serde_json::json!({ "role": role }))).await?;
            eprintln!("{user_id} is now {role}");
            Ok(())
        }
    }
}

// =============================================================================
// HTTP
// =============================================================================

fn authorized_client(cli: &CliContext) -> Result<reqwest::Client, CliError> {
    let session_token = cli
        .session_token
        .as_deref()
        .ok_or(CliError::MissingSessionToken)?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {session_token}"))?);
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

fn api_url(cli: &CliContext, path: &str) -> String {
    format!("{}{}", cli.base_url.trim_end_matches('/'), path)
}

/// Query pairs are form-encoded by reqwest; an empty slice adds no `?`.
fn prepare(
    client: &reqwest::Client,
    method: reqwest::Method,
    url: &str,
    query: &[(&str, String)],
    body: Option<Value>,
) -> reqwest::RequestBuilder {
    let request = client.request(method, url).query(query);
    if let Some(json) = body { request.json(&json) } else { request }
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    query: &[(&str, String)],
    body: Option<Value>,
) -> Result<Value, CliError> {
    let client = authorized_client(cli)?;
    let response = prepare(&client, method, &api_url(cli, path), query, body).send().await?;
    let status = response.status();
    let value = response
        .json::<Value>()
        .await
        .unwrap_or_else(|_| Value::Null);

    if !status.is_success() {
        return Err(server_error(status, &value));
    }
    Ok(value)
}

fn server_error(status: reqwest::StatusCode, body: &Value) -> CliError {
    let message = body
        .get("error")
        .and_then(Value::as_str)
        .map_or_else(|| body.to_string(), str::to_owned);
    CliError::ServerError { status: status.as_u16(), message }
}

// =============================================================================
// HELPERS
// =============================================================================

fn filter_pairs(filter: &FilterArgs) -> Vec<(&'static str, String)> {
    [
        ("name", &filter.name),
        ("date", &filter.date),
        ("type", &filter.grant_type),
        ("assignee", &filter.assignee),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.clone().filter(|v| !v.is_empty()).map(|v| (key, v)))
    .collect()
}

fn session_token(response: &reqwest::Response) -> Option<String> {
    response
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_owned())
}

fn filename_from_disposition(header: &str) -> Option<String> {
    let start = header.find("filename=\"")? + "filename=\"".len();
    let rest = &header[start..];
    let name = &rest[..rest.find('"')?];
    // Never let the server choose a path outside the working directory.
    let name = name.rsplit(['/', '\\']).next()?;
    (!name.is_empty()).then(|| name.to_owned())
}

fn read_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .map_err(|source| CliError::Io { path: "stdin".to_owned(), source })?;
        return Ok(raw);
    }
    fs::read_to_string(input).map_err(|source| CliError::Io { path: input.to_owned(), source })
}

/// Accepts a JSON array of objects, or one JSON object per line. Returns the
/// records and the number of lines that were not JSON objects.
fn parse_import_records(raw: &str) -> Result<(Vec<Value>, usize), CliError> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        let records = serde_json::from_str::<Vec<Value>>(trimmed)?;
        return Ok((records, 0));
    }

    let mut records = Vec::new();
    let mut unreadable = 0_usize;
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Map<String, Value>>(line) {
            Ok(map) => records.push(Value::Object(map)),
            Err(_) => unreadable = unreadable.saturating_add(1),
        }
    }
    Ok((records, unreadable))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
