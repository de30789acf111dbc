use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Datelike, Days, Local, NaiveDate, Weekday};
use tokio::net::TcpListener;
use tokio_postgres::{Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use slotbook::auth::Credentials;
use slotbook::config::SalonConfig;
use slotbook::engine::Engine;
use slotbook::notify::NotifyHub;
use slotbook::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<Engine>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("slotbook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let engine = Arc::new(
        Engine::new(
            dir.join("requests.wal"),
            SalonConfig::default(),
            Arc::new(NotifyHub::new()),
        )
        .unwrap(),
    );

    let engine2 = engine.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let engine = engine2.clone();
            let credentials = Credentials {
                user: None,
                password: "slotbook".to_string(),
            };
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, engine, credentials, None).await;
            });
        }
    });

    (addr, engine)
}

fn client_config(addr: SocketAddr, password: &str) -> Config {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("salon")
        .user("owner")
        .password(password);
    config
}

async fn connect(addr: SocketAddr) -> tokio_postgres::Client {
    let (client, connection) = client_config(addr, "slotbook").connect(NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

async fn rows(client: &tokio_postgres::Client, sql: &str) -> Vec<SimpleQueryRow> {
    client
        .simple_query(sql)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|msg| match msg {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

/// A Monday at least two days out, so it is always bookable.
fn next_monday() -> NaiveDate {
    let mut date = Local::now().date_naive() + Days::new(2);
    while date.weekday() != Weekday::Mon {
        date = date.succ_opt().unwrap();
    }
    date
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn wrong_password_is_refused() {
    let (addr, _engine) = start_test_server().await;
    assert!(client_config(addr, "nope").connect(NoTls).await.is_err());
}

#[tokio::test]
async fn lists_services_in_display_order() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let services = rows(&client, "SELECT * FROM services").await;
    let ids: Vec<&str> = services.iter().map(|r| r.get("id").unwrap()).collect();
    assert_eq!(
        ids,
        ["manicure", "pedicure", "gel", "acrylic", "nail-art", "mushroom-design"]
    );
    assert_eq!(services[2].get("duration_minutes"), Some("60"));
    assert_eq!(services[2].get("price"), Some("$45"));
}

#[tokio::test]
async fn lists_weekly_and_dated_hours() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let week = rows(&client, "SELECT * FROM hours").await;
    assert_eq!(week.len(), 7);
    assert_eq!(week[0].get("day"), Some("monday"));
    assert_eq!(week[4].get("close"), Some("19:00"));
    assert_eq!(week[6].get("day"), Some("sunday"));
    assert!(matches!(week[6].get("closed"), Some("t" | "true")));

    let saturday = rows(&client, "SELECT * FROM hours WHERE date = '2025-06-07'").await;
    assert_eq!(saturday.len(), 1);
    assert_eq!(saturday[0].get("day"), Some("saturday"));
    assert_eq!(saturday[0].get("open"), Some("10:00"));
    assert!(matches!(saturday[0].get("closed"), Some("f" | "false")));
}

#[tokio::test]
async fn slots_for_monday_skip_lunch() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let slots = rows(
        &client,
        "SELECT * FROM slots WHERE date = '2025-06-02' AND service = 'manicure'",
    )
    .await;
    let times: Vec<&str> = slots.iter().map(|r| r.get("time").unwrap()).collect();
    assert_eq!(times.len(), 16);
    assert_eq!(times.first(), Some(&"09:00"));
    assert_eq!(times.last(), Some(&"17:30"));
    assert!(!times.contains(&"12:30"));
    assert!(!times.contains(&"13:00"));
    assert_eq!(slots[0].get("display"), Some("9:00 AM"));
    assert_eq!(slots[0].get("start_minutes"), Some("540"));
}

#[tokio::test]
async fn closed_day_has_no_slots() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let slots = rows(
        &client,
        "SELECT * FROM slots WHERE date = '2025-06-08' AND service = 'gel'",
    )
    .await;
    assert!(slots.is_empty());
}

#[tokio::test]
async fn unknown_service_is_an_error() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let err = client
        .simple_query("SELECT * FROM slots WHERE date = '2025-06-02' AND service = 'waxing'")
        .await
        .unwrap_err();
    let db = err.as_db_error().unwrap();
    assert_eq!(db.code().code(), "P0001");
    assert!(db.message().contains("waxing"));
}

#[tokio::test]
async fn malformed_sql_is_a_syntax_error() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let err = client.simple_query("SELECT * FROM staff").await.unwrap_err();
    assert_eq!(err.as_db_error().unwrap().code().code(), "42601");
}

#[tokio::test]
async fn submit_and_list_request() {
    let (addr, engine) = start_test_server().await;
    let client = connect(addr).await;
    let monday = next_monday().format("%Y-%m-%d").to_string();

    client
        .batch_execute(&format!(
            "INSERT INTO requests VALUES ('Ada Lovelace', '5551234567', NULL, 'gel', '{monday}', '14:00', 'Almond shape')"
        ))
        .await
        .unwrap();
    assert_eq!(engine.request_count(), 1);

    let listed = rows(
        &client,
        &format!("SELECT * FROM requests WHERE date = '{monday}'"),
    )
    .await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].get("client_name"), Some("Ada Lovelace"));
    assert_eq!(listed[0].get("email"), None);
    assert_eq!(listed[0].get("service"), Some("gel"));
    assert_eq!(listed[0].get("time"), Some("14:00"));
    assert_eq!(listed[0].get("special_requests"), Some("Almond shape"));
    assert_eq!(listed[0].get("status"), Some("pending"));
}

#[tokio::test]
async fn request_during_lunch_is_refused() {
    let (addr, engine) = start_test_server().await;
    let client = connect(addr).await;
    let monday = next_monday().format("%Y-%m-%d").to_string();

    let err = client
        .batch_execute(&format!(
            "INSERT INTO requests VALUES ('Ada', '555', NULL, 'manicure', '{monday}', '12:30')"
        ))
        .await
        .unwrap_err();
    assert_eq!(err.as_db_error().unwrap().code().code(), "P0001");
    assert_eq!(engine.request_count(), 0);
}
