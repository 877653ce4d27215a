use clientdb_core::db::open_db_in_memory;
use clientdb_core::{
    ClientFilter, ClientId, ClientRepository, ClientRow, NewClient, SqliteClientRepository,
};
use std::ops::ControlFlow;

struct Fixture {
    a: ClientId,
    b: ClientId,
}

const P1: &str = "+7-900-111-22-33";
const P2: &str = "+7-900-111-22-44";

fn seed(repo: &SqliteClientRepository<'_>) -> Fixture {
    let a = repo
        .add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com"))
        .unwrap();
    let b = repo
        .add_client(&NewClient::new("Petr", "Petrov", "petr@example.com"))
        .unwrap();
    repo.add_phone(a, P1).unwrap();
    repo.add_phone(a, P2).unwrap();
    Fixture { a, b }
}

#[test]
fn unconstrained_search_returns_every_client_phone_pair() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    let fx = seed(&repo);

    let rows = repo.find_client(&ClientFilter::default()).unwrap();

    let pairs: Vec<_> = rows
        .iter()
        .map(|row| (row.client_id, row.phone.as_deref()))
        .collect();
    assert_eq!(
        pairs,
        vec![(fx.a, Some(P1)), (fx.a, Some(P2)), (fx.b, None)]
    );
    assert!(rows[..2].iter().all(|row| row.email == "ivan@example.com"));
}

#[test]
fn phone_criterion_filters_joined_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    let fx = seed(&repo);

    let rows = repo.find_client(&ClientFilter::by_phone(P1)).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].client_id, fx.a);
    assert_eq!(rows[0].phone.as_deref(), Some(P1));
}

#[test]
fn criteria_are_conjunctive() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    let fx = seed(&repo);

    let matching = repo
        .find_client(&ClientFilter::from_parts("Ivan", "Ivanov", "", P2))
        .unwrap();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].client_id, fx.a);

    let mismatched = repo
        .find_client(&ClientFilter::from_parts("Ivan", "Petrov", "", ""))
        .unwrap();
    assert!(mismatched.is_empty());
}

#[test]
fn name_criterion_keeps_all_phone_rows_of_match() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    let fx = seed(&repo);

    let rows = repo
        .find_client(&ClientFilter::from_parts("Ivan", "", "", ""))
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.client_id == fx.a && row.has_phone()));

    let phoneless = repo
        .find_client(&ClientFilter::from_parts("", "Petrov", "", ""))
        .unwrap();
    assert_eq!(
        phoneless,
        vec![ClientRow {
            client_id: fx.b,
            first_name: "Petr".to_string(),
            last_name: "Petrov".to_string(),
            email: "petr@example.com".to_string(),
            phone: None,
        }]
    );
}

#[test]
fn matching_is_exact() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    seed(&repo);

    for filter in [
        ClientFilter::from_parts("ivan", "", "", ""),
        ClientFilter::from_parts("Iva", "", "", ""),
        ClientFilter::by_email("IVAN@example.com"),
        ClientFilter::by_phone("+79001112233"),
    ] {
        assert!(repo.find_client(&filter).unwrap().is_empty(), "{filter:?}");
    }
}

#[test]
fn no_match_is_empty_not_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    assert!(repo
        .find_client(&ClientFilter::by_email("nobody@example.com"))
        .unwrap()
        .is_empty());
    assert!(repo.find_client(&ClientFilter::default()).unwrap().is_empty());
}

#[test]
fn injection_attempt_matches_nothing_and_alters_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    seed(&repo);

    for hostile in [
        "a' OR '1'='1",
        "x'; DROP TABLE clients; --",
        "\" OR 1=1 --",
    ] {
        let filter = ClientFilter::from_parts(hostile, hostile, hostile, hostile);
        assert!(repo.find_client(&filter).unwrap().is_empty());
        assert!(repo
            .find_client(&ClientFilter::by_email(hostile))
            .unwrap()
            .is_empty());
    }

    assert_eq!(repo.find_client(&ClientFilter::default()).unwrap().len(), 3);
}

#[test]
fn quote_characters_are_matched_literally() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let id = repo
        .add_client(&NewClient::new("D'Arcy", "O'Brien", "o'brien@example.com"))
        .unwrap();

    let rows = repo
        .find_client(&ClientFilter::from_parts("D'Arcy", "O'Brien", "", ""))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].client_id, id);
}

#[test]
fn scan_streams_rows_and_can_stop_early() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    let fx = seed(&repo);

    let mut seen = Vec::new();
    let visited = repo
        .scan_clients(&ClientFilter::default(), &mut |row| {
            seen.push(row.client_id);
            ControlFlow::Break(())
        })
        .unwrap();
    assert_eq!(visited, 1);
    assert_eq!(seen, vec![fx.a]);

    // Re-invoking restarts from the first row.
    let mut total = 0;
    let visited = repo
        .scan_clients(&ClientFilter::default(), &mut |_| {
            total += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!((visited, total), (3, 3));
}

#[test]
fn search_reflects_writes_between_invocations() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    let fx = seed(&repo);

    repo.delete_phone(fx.a, P2).unwrap();
    repo.delete_client(fx.b).unwrap();

    let rows = repo.find_client(&ClientFilter::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].phone.as_deref(), Some(P1));
}

#[test]
fn rows_serialize_absent_phone_as_null() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    let fx = seed(&repo);

    let rows = repo
        .find_client(&ClientFilter::by_email("petr@example.com"))
        .unwrap();
    let json = serde_json::to_value(&rows[0]).unwrap();

    assert_eq!(json["client_id"], fx.b);
    assert!(json["phone"].is_null());
}
