//! Shared utilities for integration tests.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use zip::write::SimpleFileOptions;

/// Reserve a port that is free at the time of the call.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Build a web archive holding the given files.
pub fn war(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Archive with a single `index.html`.
pub fn index_war(body: &str) -> Vec<u8> {
    war(&[("index.html", body)])
}

/// Poll `url` until the server answers or the deadline passes.
pub async fn get_when_ready(url: &str) -> reqwest::Response {
    get_with_when_ready(&reqwest::Client::new(), url).await
}

/// Write a self-signed `localhost` keystore (certificate then key) into `dir`.
#[allow(dead_code)]
pub fn pem_keystore(dir: &Path) -> PathBuf {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let path = dir.join("server.pem");
    let pem = format!("{}{}", generated.cert.pem(), generated.key_pair.serialize_pem());
    std::fs::write(&path, pem).unwrap();
    path
}

/// Client trusting any certificate and never following redirects.
#[allow(dead_code)]
pub fn insecure_client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Like [`get_when_ready`] but with the given client.
pub async fn get_with_when_ready(client: &reqwest::Client, url: &str) -> reqwest::Response {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match client.get(url).send().await {
            Ok(response) => return response,
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            Err(e) => panic!("server at {url} never answered: {e}"),
        }
    }
}
