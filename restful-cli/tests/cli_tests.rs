use clap::Parser;
use pretty_assertions::assert_eq;
use restful_cli::{parse_filter, run, Args, Command};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn args(line: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("restful").chain(line.iter().copied())).unwrap()
}

// ── Arguments ───────────────────────────────────────────────────

#[test]
fn filters_parse_json_values_or_strings() {
    assert_eq!(parse_filter("name=rust").unwrap(), ("name".to_string(), json!("rust")));
    assert_eq!(parse_filter("stars=5").unwrap(), ("stars".to_string(), json!(5)));
    assert_eq!(parse_filter("open=true").unwrap(), ("open".to_string(), json!(true)));
    assert_eq!(parse_filter("q=a=b").unwrap(), ("q".to_string(), json!("a=b")));

    assert!(parse_filter("name").is_err());
    assert!(parse_filter("=rust").is_err());
}

#[test]
fn list_collects_repeated_filters() {
    let args = args(&[
        "--base-uri",
        "http://localhost/",
        "list",
        "repos",
        "--page",
        "2",
        "--filter",
        "language=rust",
        "--filter",
        "stars=5",
    ]);

    match args.command {
        Command::List {
            resource,
            page,
            size,
            filters,
            ..
        } => {
            assert_eq!(resource, "repos");
            assert_eq!((page, size), (2, 10));
            assert_eq!(
                filters,
                vec![
                    ("language".to_string(), json!("rust")),
                    ("stars".to_string(), json!(5))
                ]
            );
        }
        other => panic!("expected list, got {other:?}"),
    }
}

#[test]
fn malformed_filter_is_rejected() {
    let parsed = Args::try_parse_from(["restful", "list", "repos", "--filter", "oops"]);
    assert!(parsed.is_err());
}

// ── Commands ────────────────────────────────────────────────────

#[tokio::test]
async fn get_prints_one_item_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "login": "octocat" })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(args(&[
        "--base-uri",
        &server.uri(),
        "--token",
        "secret",
        "get",
        "users",
        "octocat",
    ]))
    .await
    .unwrap();

    assert_eq!(output, json!({ "id": 1, "login": "octocat" }));
}

#[tokio::test]
async fn list_reports_page_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "rust"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 12,
            "items": [{ "id": 6 }, { "id": 7 }, { "id": 8 }, { "id": 9 }, { "id": 10 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(args(&[
        "--base-uri",
        &server.uri(),
        "list",
        "search/repositories",
        "--page",
        "2",
        "--size",
        "5",
        "--filter",
        "q=rust",
        "--items-key",
        "items",
        "--total-key",
        "total_count",
    ]))
    .await
    .unwrap();

    assert_eq!(output["pageIndex"], json!(2));
    assert_eq!(output["pageSize"], json!(5));
    assert_eq!(output["totalCount"], json!(12));
    assert_eq!(output["pageCount"], json!(3));
    assert_eq!(output["noMore"], json!(false));
    assert_eq!(output["items"][0], json!({ "id": 6 }));
}

#[tokio::test]
async fn http_errors_carry_context() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let err = run(args(&["--base-uri", &server.uri(), "get", "users", "ghost"]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to get users/ghost");
    assert!(format!("{err:#}").contains("Not Found"));
}

#[tokio::test]
async fn download_writes_the_file_and_remembers_the_task() {
    let server = MockServer::start().await;
    let body: Vec<u8> = (0..=255u8).collect();
    Mock::given(method("GET"))
        .and(path("/files/archive.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.db");
    let target = dir.path().join("downloads");
    let url = format!("{}/files/archive.bin", server.uri());

    let line = [
        "--state",
        state.to_str().unwrap(),
        "download",
        url.as_str(),
        "--dir",
        target.to_str().unwrap(),
    ];
    let output = run(args(&line)).await.unwrap();

    assert_eq!(output["name"], json!("archive.bin"));
    assert_eq!(output["loaded"], json!(256));
    assert_eq!(output["percent"], json!(100.0));
    assert_eq!(std::fs::read(target.join("archive.bin")).unwrap(), body);

    // The finished task is restored from the state file and not fetched again.
    let output = run(args(&line)).await.unwrap();
    assert_eq!(output["loaded"], json!(256));
}
