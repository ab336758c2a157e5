//! Client for the simulation clock server, a line-based TCP service that
//! reports the current simulated time and whether the simulation is
//! running.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

/// Clock line queried on the server
const CLOCK_LINE: u32 = 1;
/// Socket timeout for connecting, sending and receiving
const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("i/o error talking to the clock server: {0}")]
    Io(#[from] std::io::Error),
    #[error("clock did not send a proper reply: {0}")]
    BadReply(String),
    #[error("clock sent status {got}, expected {expected}")]
    UnexpectedStatus { expected: u16, got: u16 },
}

/// Run state reported by the clock server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
}

/// Connection to the clock server.
///
/// The server greets with a `100` line; every `get <line>` request is
/// answered with `200 <line> <unix-seconds> <scale> <state>`. Codes of 500
/// and above signal errors.
pub struct ClockConnection {
    reader: BufReader<TcpStream>,
}

impl ClockConnection {
    /// Connect and consume the greeting.
    ///
    /// # Errors
    ///
    /// Fails with [`ClockError::Io`] on socket problems and
    /// [`ClockError::BadReply`]/[`ClockError::UnexpectedStatus`] on a
    /// malformed or refused greeting.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClockError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(TIMEOUT))?;
        stream.set_write_timeout(Some(TIMEOUT))?;

        let mut connection = Self {
            reader: BufReader::new(stream),
        };
        connection.read_reply(100)?;
        Ok(connection)
    }

    /// Query the current simulation time.
    ///
    /// # Errors
    ///
    /// Fails like [`ClockConnection::connect`], plus on replies for the
    /// wrong clock line or with unparsable fields.
    pub fn get_time(&mut self) -> Result<(ClockState, NaiveDateTime), ClockError> {
        self.send_line(&format!("get {CLOCK_LINE}"))?;
        let data = self.read_reply(200)?;

        let (state, timestamp) = parse_time_reply(&data)?;
        let time = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| ClockError::BadReply(format!("timestamp {timestamp} out of range")))?
            .naive_utc();

        Ok((state, time))
    }

    fn send_line(&mut self, line: &str) -> Result<(), ClockError> {
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
        Ok(())
    }

    /// Read one reply line and check its status code.
    fn read_reply(&mut self, expected: u16) -> Result<String, ClockError> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line)?;
        if read == 0 {
            return Err(ClockError::BadReply("clock did not send a reply".to_string()));
        }
        if !line.ends_with('\n') {
            return Err(ClockError::BadReply("reply line was cut short".to_string()));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        let (code, data) = trimmed
            .split_once(' ')
            .ok_or_else(|| ClockError::BadReply(format!("no status code in {trimmed:?}")))?;
        let code: u16 = code
            .parse()
            .map_err(|_| ClockError::BadReply(format!("bad status code in {trimmed:?}")))?;

        if code != expected {
            return Err(ClockError::UnexpectedStatus { expected, got: code });
        }

        Ok(data.to_string())
    }
}

/// Parse the payload of a `200` reply: `<line> <unix-seconds> <scale>
/// <state>`. The scale factor is reported but not used.
fn parse_time_reply(data: &str) -> Result<(ClockState, i64), ClockError> {
    let bad = || ClockError::BadReply(data.to_string());

    let fields: Vec<&str> = data.split(' ').collect();
    if fields.len() != 4 {
        return Err(bad());
    }

    let line: u32 = fields[0].parse().map_err(|_| bad())?;
    if line != CLOCK_LINE {
        return Err(ClockError::BadReply(format!("reply for clock line {line}, asked for {CLOCK_LINE}")));
    }

    let timestamp: i64 = fields[1].parse().map_err(|_| bad())?;
    let state = match fields[3] {
        "0" => ClockState::Stopped,
        "1" => ClockState::Running,
        _ => return Err(bad()),
    };

    Ok((state, timestamp))
}

/// One-shot query against the configured clock server.
///
/// # Errors
///
/// Same failure modes as [`ClockConnection::get_time`].
pub fn fetch_time(clock_server: &str) -> Result<(ClockState, NaiveDateTime), ClockError> {
    ClockConnection::connect(clock_server)?.get_time()
}
