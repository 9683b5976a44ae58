use std::fs;
use std::path::Path;

use client::Client;
use server::{Config, Server};

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn fresh(dir: &Path) -> (Client, Server) {
    let client = Client::open(dir.join("client_state.json")).unwrap();
    let server = Server::open(Config::with_root(dir.join("server"))).unwrap();
    (client, server)
}

#[test]
fn scenario_a_two_uploads_one_keyword() {
    let dir = tempfile::tempdir().unwrap();
    let (client, server) = fresh(dir.path());

    let plans = write_file(dir.path(), "plans.txt", b"top secret");
    let report = write_file(dir.path(), "report.txt", b"Q4 report");

    let (file_id_1, _) = client.upload(&server, "confidential", &plans).unwrap();
    let (file_id_2, _) = client.upload(&server, "confidential", &report).unwrap();

    let (results, _) = client.search(&server, "confidential").unwrap();
    let results = results.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].file_id, file_id_2);
    assert_eq!(results[0].original_name, "report.txt");
    assert_eq!(results[1].file_id, file_id_1);
    assert_eq!(results[1].original_name, "plans.txt");
    assert_ne!(results[0].file_key, results[1].file_key);
}

#[test]
fn scenario_b_and_c_cross_keyword_isolation_and_unknown_keyword() {
    let dir = tempfile::tempdir().unwrap();
    let (client, server) = fresh(dir.path());

    let x = write_file(dir.path(), "x.txt", b"1");
    let y = write_file(dir.path(), "y.txt", b"2");
    client.upload(&server, "a", &x).unwrap();
    client.upload(&server, "b", &y).unwrap();

    let (a_results, _) = client.search(&server, "a").unwrap();
    let a_results = a_results.unwrap();
    assert_eq!(a_results.len(), 1);
    assert_eq!(a_results[0].original_name, "x.txt");

    let (b_results, _) = client.search(&server, "b").unwrap();
    let b_results = b_results.unwrap();
    assert_eq!(b_results.len(), 1);
    assert_eq!(b_results[0].original_name, "y.txt");

    let (c_results, _) = client.search(&server, "c").unwrap();
    assert!(c_results.is_none());
}

#[test]
fn scenario_d_restart_durability() {
    let dir = tempfile::tempdir().unwrap();
    let plans = write_file(dir.path(), "plans.txt", b"top secret");
    let report = write_file(dir.path(), "report.txt", b"Q4 report");

    {
        let (client, server) = fresh(dir.path());
        client.upload(&server, "confidential", &plans).unwrap();
        client.upload(&server, "confidential", &report).unwrap();
    }

    // Reconstruct client and server from persisted artifacts only.
    let (client, server) = fresh(dir.path());
    let (results, _) = client.search(&server, "confidential").unwrap();
    let results = results.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].original_name, "report.txt");
    assert_eq!(results[1].original_name, "plans.txt");
}

#[test]
fn scenario_e_tampering_truncates_at_the_head() {
    let dir = tempfile::tempdir().unwrap();
    let (client, server) = fresh(dir.path());

    let plans = write_file(dir.path(), "plans.txt", b"top secret");
    let report = write_file(dir.path(), "report.txt", b"Q4 report");
    client.upload(&server, "confidential", &plans).unwrap();
    let (file_id_2, _) = client.upload(&server, "confidential", &report).unwrap();

    // Locate the head address/key via the client's own state, then have the
    // "adversarial server" flip a ciphertext byte directly in the index store.
    let (results_before, _) = client.search(&server, "confidential").unwrap();
    assert_eq!(results_before.unwrap()[0].file_id, file_id_2);

    let state_bytes = fs::read(dir.path().join("client_state.json")).unwrap();
    let state: std::collections::BTreeMap<String, (String, String)> =
        serde_json::from_slice(&state_bytes).unwrap();
    let (key_hex, address_hex) = state.get("confidential").unwrap().clone();
    let key = dsse_core::crypto::key_from_hex(&key_hex).unwrap();
    let address = dsse_core::crypto::address_from_hex(&address_hex).unwrap();

    let (nonce, mut ciphertext) = server.index_store().get_node(&address).unwrap();
    ciphertext[0] ^= 0xff;
    server.index_store().put_node(&address, &nonce, &ciphertext).unwrap();

    let results = server.search(&key, &address).unwrap();
    assert!(results.is_empty());
    assert!(!results.iter().any(|d| d.file_id == file_id_2));
}

#[test]
fn scenario_f_wrong_download_key_fails_and_writes_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let (client, server) = fresh(dir.path());

    let plans = write_file(dir.path(), "plans.txt", b"top secret");
    let report = write_file(dir.path(), "report.txt", b"Q4 report");
    let (file_id_1, _) = client.upload(&server, "confidential", &plans).unwrap();
    let (_file_id_2, _) = client.upload(&server, "confidential", &report).unwrap();

    let (results, _) = client.search(&server, "confidential").unwrap();
    let results = results.unwrap();
    let k2 = results.iter().find(|d| d.original_name == "report.txt").unwrap().file_key.clone();

    let out_path = dir.path().join("out.txt");
    let outcome = client.download(&server, &file_id_1, &k2, &out_path);
    assert!(outcome.is_err());
    assert!(!out_path.exists());
}

#[test]
fn download_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (client, server) = fresh(dir.path());
    let path = write_file(dir.path(), "a.txt", b"payload bytes");
    let (file_id, _) = client.upload(&server, "kw", &path).unwrap();
    let (results, _) = client.search(&server, "kw").unwrap();
    let descriptor = results.unwrap().into_iter().next().unwrap();
    assert_eq!(descriptor.file_id, file_id);

    let out_path = dir.path().join("out.txt");
    client.download(&server, &descriptor.file_id, &descriptor.file_key, &out_path).unwrap();
    let first = fs::read(&out_path).unwrap();
    client.download(&server, &descriptor.file_id, &descriptor.file_key, &out_path).unwrap();
    let second = fs::read(&out_path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn repeated_upload_of_the_same_file_produces_two_distinct_chain_entries() {
    let dir = tempfile::tempdir().unwrap();
    let (client, server) = fresh(dir.path());
    let path = write_file(dir.path(), "a.txt", b"same bytes");

    let (id1, _) = client.upload(&server, "kw", &path).unwrap();
    let (id2, _) = client.upload(&server, "kw", &path).unwrap();
    assert_ne!(id1, id2);

    let (results, _) = client.search(&server, "kw").unwrap();
    assert_eq!(results.unwrap().len(), 2);
}

#[test]
fn empty_file_uploads_searches_and_downloads_successfully() {
    let dir = tempfile::tempdir().unwrap();
    let (client, server) = fresh(dir.path());
    let path = write_file(dir.path(), "empty.txt", b"");

    let (file_id, _) = client.upload(&server, "kw", &path).unwrap();
    let (results, _) = client.search(&server, "kw").unwrap();
    let descriptor = results.unwrap().into_iter().next().unwrap();
    assert_eq!(descriptor.file_id, file_id);

    let out_path = dir.path().join("out.txt");
    let ok = client.download(&server, &descriptor.file_id, &descriptor.file_key, &out_path).unwrap();
    assert!(ok);
    assert_eq!(fs::read(&out_path).unwrap(), Vec::<u8>::new());
}
