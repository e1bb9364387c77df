//! SFTP acquisition, with private-key auth as an alternative to password.
//!
//! Connects over SSH (Ed25519 private key when `ssh_private_key` is configured,
//! password otherwise), lists the remote directory, matches candidates against the
//! dataset's file pattern, and streams each new match into the inbound zone in
//! fixed-size chunks.

use std::io::{Read, Write};
use std::net::TcpStream;

use ssh2::Session;

use lakebatch_core::pattern_matcher;

use crate::context::Deduper;
use crate::error::{ExtractError, Result};
use crate::object_store::AcquiredFile;

const CHUNK_SIZE: usize = 500 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SftpConnection {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub ssh_private_key: Option<String>,
    pub remote_directory: String,
}

fn connect(conn: &SftpConnection) -> Result<Session> {
    let tcp = TcpStream::connect((conn.host.as_str(), conn.port)).map_err(ExtractError::Io)?;
    let mut session = Session::new().map_err(|e| ExtractError::Sftp(e.to_string()))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| ExtractError::Sftp(e.to_string()))?;

    match &conn.ssh_private_key {
        Some(private_key_pem) => session
            .userauth_pubkey_memory(&conn.username, None, private_key_pem, None)
            .map_err(|e| ExtractError::Sftp(e.to_string()))?,
        None => {
            let password = conn
                .password
                .as_deref()
                .ok_or_else(|| ExtractError::InvalidConfig("sftp connection has neither a private key nor a password".into()))?;
            session
                .userauth_password(&conn.username, password)
                .map_err(|e| ExtractError::Sftp(e.to_string()))?;
        }
    }
    Ok(session)
}

/// Acquire every new, pattern-matching file under `conn.remote_directory`, writing
/// each into `local_landing_dir` under its own basename.
pub fn acquire(
    conn: &SftpConnection,
    local_landing_dir: &std::path::Path,
    env_bucket: &str,
    file_pattern: &str,
    pattern_is_static: bool,
    deduper: &mut Deduper,
) -> Result<Vec<AcquiredFile>> {
    let session = connect(conn)?;
    let sftp = session.sftp().map_err(|e| ExtractError::Sftp(e.to_string()))?;

    let entries = sftp
        .readdir(std::path::Path::new(&conn.remote_directory))
        .map_err(|e| ExtractError::Sftp(e.to_string()))?;

    std::fs::create_dir_all(local_landing_dir)?;

    let mut acquired = Vec::new();
    for (path, _stat) in entries {
        let basename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        if !pattern_matcher::validate_pattern(file_pattern, &basename, pattern_is_static)? {
            continue;
        }

        let target_location = format!("{env_bucket}/{basename}");
        if !deduper.is_new(&target_location) {
            continue;
        }

        let mut remote_file = sftp.open(&path).map_err(|e| ExtractError::Sftp(e.to_string()))?;
        let local_path = local_landing_dir.join(&basename);
        let mut local_file = std::fs::File::create(&local_path)?;

        let mut buf = vec![0u8; CHUNK_SIZE.min(64 * 1024 * 1024)];
        let mut byte_count = 0u64;
        loop {
            let read = remote_file.read(&mut buf)?;
            if read == 0 {
                break;
            }
            local_file.write_all(&buf[..read])?;
            byte_count += read as u64;
        }

        deduper.mark_seen(target_location.clone());
        acquired.push(AcquiredFile {
            source_file: basename,
            inbound_location: target_location,
            byte_count,
        });
    }

    if acquired.is_empty() {
        return Err(ExtractError::InvalidConfig(
            "No unprocessed files are found.".to_string(),
        ));
    }
    Ok(acquired)
}
