use super::RemoteStore;
use crate::error::{TransferError, TransferStage};
use crate::models::FtpConfig;
use crate::naming::StorageKey;
use async_trait::async_trait;
use std::io::{self, Cursor, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info, warn};

/// Uploads over plain FTP: connect, login, cwd, binary STOR, quit.
pub struct FtpStore {
    config: FtpConfig,
}

impl FtpStore {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    fn resolve(config: &FtpConfig) -> Result<Vec<SocketAddr>, TransferError> {
        let addrs: Vec<SocketAddr> = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| TransferError::stage(TransferStage::Connect, e))?
            .collect();
        if addrs.is_empty() {
            return Err(TransferError::stage(
                TransferStage::Connect,
                "host resolved to no addresses",
            ));
        }
        Ok(addrs)
    }

    /// Open the control connection on the first address that accepts it,
    /// with socket timeouts applied to both the control and data channels.
    fn connect(addrs: &[SocketAddr], config: &FtpConfig) -> Result<FtpStream, TransferError> {
        let mut last_error = None;
        for addr in addrs {
            debug!("FTP connect to {} ({}s timeout)", addr, config.connect_timeout.as_secs());
            match FtpStream::connect_timeout(*addr, config.connect_timeout) {
                Ok(ftp) => return Self::apply_timeouts(ftp, config),
                Err(e) => {
                    debug!("FTP connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => TransferError::stage(TransferStage::Connect, e),
            None => TransferError::stage(TransferStage::Connect, "host resolved to no addresses"),
        })
    }

    fn apply_timeouts(ftp: FtpStream, config: &FtpConfig) -> Result<FtpStream, TransferError> {
        let socket = ftp.get_ref();
        socket
            .set_read_timeout(Some(config.io_timeout))
            .and_then(|_| socket.set_write_timeout(Some(config.io_timeout)))
            .map_err(|e| TransferError::stage(TransferStage::Connect, e))?;

        let connect_timeout = config.connect_timeout;
        let io_timeout = config.io_timeout;
        Ok(ftp.passive_stream_builder(move |addr| {
            let stream = TcpStream::connect_timeout(&addr, connect_timeout)
                .map_err(FtpError::ConnectionError)?;
            stream
                .set_write_timeout(Some(io_timeout))
                .and_then(|_| stream.set_read_timeout(Some(io_timeout)))
                .map_err(FtpError::ConnectionError)?;
            Ok(stream)
        }))
    }

    fn store_sync(
        config: &FtpConfig,
        key: &str,
        data: &[u8],
        session: &SessionState,
    ) -> Result<(), TransferError> {
        let addrs = Self::resolve(config)?;
        let mut ftp = Self::connect(&addrs, config)?;

        let result = Self::run_session(&mut ftp, config, key, data, session);

        // Past this point the outcome is settled; the goodbye cannot change it.
        if let Err(e) = ftp.quit() {
            if result.is_ok() {
                warn!("FTP quit failed after upload of {}: {}", key, e);
            }
        }

        result
    }

    fn run_session(
        ftp: &mut FtpStream,
        config: &FtpConfig,
        key: &str,
        data: &[u8],
        session: &SessionState,
    ) -> Result<(), TransferError> {
        session.check()?;
        debug!("FTP login as {}", config.username);
        ftp.login(config.username.as_str(), config.password.as_str())
            .map_err(|e| TransferError::stage(TransferStage::Login, e))?;

        session.check()?;
        debug!("FTP cwd {}", config.upload_dir);
        ftp.cwd(config.upload_dir.as_str())
            .map_err(|e| TransferError::stage(TransferStage::Navigate, e))?;

        session.check()?;
        ftp.transfer_type(FileType::Binary)
            .map_err(|e| TransferError::stage(TransferStage::Transfer, e))?;

        debug!("FTP STOR {} ({} bytes)", key, data.len());
        let mut reader = CancellableReader {
            inner: Cursor::new(data),
            session,
        };
        let written = match ftp.put_file(key, &mut reader) {
            Ok(written) => written,
            Err(e) => {
                remove_partial(ftp, key);
                if session.is_aborted() {
                    return Err(TransferError::Cancelled);
                }
                return Err(TransferError::stage(TransferStage::Transfer, e));
            }
        };

        if written != data.len() as u64 {
            remove_partial(ftp, key);
            return Err(TransferError::stage(
                TransferStage::Transfer,
                format!("short write: {} of {} bytes", written, data.len()),
            ));
        }

        if !session.commit() {
            // The caller gave up before the object was accepted.
            remove_partial(ftp, key);
            return Err(TransferError::Cancelled);
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FtpStore {
    async fn store(
        &self,
        key: &StorageKey,
        data: &[u8],
        deadline: Duration,
    ) -> Result<(), TransferError> {
        let session = Arc::new(SessionState::new());
        let _guard = AbortOnDrop(session.clone());

        let config = self.config.clone();
        let key = key.as_str().to_string();
        let data = data.to_vec();
        let task_session = session.clone();
        let task_key = key.clone();

        let mut task = tokio::task::spawn_blocking(move || {
            Self::store_sync(&config, &task_key, &data, &task_session)
        });

        let joined = match tokio::time::timeout(deadline, &mut task).await {
            Ok(joined) => joined,
            Err(_) if session.abort() => {
                warn!("FTP upload of {} exceeded {:?} deadline", key, deadline);
                return Err(TransferError::Timeout(deadline));
            }
            Err(_) => {
                // STOR was accepted before the deadline; only the goodbye is
                // still in flight and it finishes in the background.
                info!("FTP upload of {} completed, session closing late", key);
                return Ok(());
            }
        };

        joined.map_err(|e| {
            TransferError::stage(TransferStage::Transfer, format!("upload task join error: {}", e))
        })??;

        info!("FTP upload of {} completed", key);
        Ok(())
    }
}

const RUNNING: u8 = 0;
const COMMITTED: u8 = 1;
const ABORTED: u8 = 2;

/// Outcome of one session, shared between the caller and the blocking task.
///
/// Moves out of `RUNNING` exactly once: the task commits after the server
/// accepts STOR, or the caller aborts. Whichever side loses the race learns
/// the final outcome from the other.
struct SessionState(AtomicU8);

impl SessionState {
    fn new() -> Self {
        Self(AtomicU8::new(RUNNING))
    }

    fn commit(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, COMMITTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn abort(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, ABORTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst) == ABORTED
    }

    fn check(&self) -> Result<(), TransferError> {
        if self.is_aborted() {
            return Err(TransferError::Cancelled);
        }
        Ok(())
    }
}

fn remove_partial(ftp: &mut FtpStream, key: &str) {
    if let Err(e) = ftp.rm(key) {
        debug!("Could not remove partial upload {}: {}", key, e);
    }
}

/// Aborts the session when the owning future is dropped. A committed
/// session is left alone.
struct AbortOnDrop(Arc<SessionState>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Upload body that stops yielding bytes once the upload is abandoned.
struct CancellableReader<'a, R> {
    inner: R,
    session: &'a SessionState,
}

impl<R: Read> Read for CancellableReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.session.is_aborted() {
            // Not `Interrupted`: io::copy would retry that forever.
            return Err(io::Error::other("upload cancelled"));
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, port: u16) -> FtpConfig {
        FtpConfig {
            host: host.to_string(),
            port,
            username: "user".to_string(),
            password: "secret".to_string(),
            upload_dir: "/".to_string(),
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(2),
        }
    }

    fn refused_addr() -> SocketAddr {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn test_cancellable_reader_stops_after_abort() {
        let session = SessionState::new();
        let mut reader = CancellableReader {
            inner: Cursor::new(vec![1u8; 16]),
            session: &session,
        };

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 8);

        assert!(session.abort());
        assert!(reader.read(&mut buf).is_err());
    }

    #[test]
    fn test_abort_on_drop_leaves_committed_session() {
        let running = Arc::new(SessionState::new());
        {
            let _guard = AbortOnDrop(running.clone());
        }
        assert!(running.is_aborted());
        assert!(!running.commit());

        let committed = Arc::new(SessionState::new());
        assert!(committed.commit());
        {
            let _guard = AbortOnDrop(committed.clone());
        }
        assert!(!committed.is_aborted());
    }

    #[test]
    fn test_connect_falls_through_to_next_address() {
        let live = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let live_addr = live.local_addr().unwrap();
        std::thread::spawn(move || {
            use std::io::Write;
            if let Ok((mut socket, _)) = live.accept() {
                let _ = socket.write_all(b"220 ready\r\n");
                std::thread::sleep(Duration::from_millis(200));
            }
        });

        let addrs = [refused_addr(), live_addr];
        let ftp = FtpStore::connect(&addrs, &config("127.0.0.1", live_addr.port()));

        assert!(ftp.is_ok());
    }

    #[test]
    fn test_connect_reports_last_failure_when_all_refuse() {
        let addrs = [refused_addr(), refused_addr()];

        let err = FtpStore::connect(&addrs, &config("127.0.0.1", 21)).err().unwrap();

        assert!(matches!(
            err,
            TransferError::Stage {
                stage: TransferStage::Connect,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_connect_failure() {
        let port = refused_addr().port();
        let store = FtpStore::new(config("127.0.0.1", port));

        let err = store
            .store(&StorageKey::allocate("webp"), b"data", Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::Stage {
                stage: TransferStage::Connect,
                ..
            }
        ));
    }
}
