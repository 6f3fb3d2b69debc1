//! Tier 1 client for the external high-fidelity weight estimator: a
//! blocking multipart/form-data POST over a plain [`TcpStream`], every
//! socket operation bounded by the configured timeout. Any failure here
//! is recoverable by design and maps to
//! [`EstimateError::RemoteUnavailable`].

use std::{
    io::{Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use serde::Deserialize;
use tracing::debug;

use common::config::PrintParameters;

use crate::{
    error::EstimateError,
    model::{Method, VolumeBreakdown},
    orchestrator::{EstimationTier, RemoteConfig},
};

// The remote api takes fixed slicing parameters; only infill and
// density vary per request.
const LINE_THICKNESS: f32 = 0.2;
const LAYER_HEIGHT: f32 = 0.2;
const SHELL_COUNT: u32 = 2;

pub struct RemoteTier {
    config: RemoteConfig,
}

/// Success payload of the remote service. Everything but the weight is
/// optional; a weight-only response is still usable but gets the
/// warning flag since the volume breakdown is unknown.
#[derive(Deserialize, Debug)]
struct RemoteResponse {
    weight_grams: f64,
    #[serde(default)]
    total_volume_cm3: Option<f64>,
    #[serde(default)]
    shell_volume_cm3: Option<f64>,
    #[serde(default)]
    infill_volume_cm3: Option<f64>,
}

impl RemoteTier {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn request(&self, bytes: &[u8], params: &PrintParameters) -> Result<RemoteResponse, String> {
        // One deadline for the whole exchange. Per-operation socket
        // timeouts alone would let a server that drips bytes hold the
        // request open indefinitely.
        let deadline = Instant::now() + self.config.timeout;
        let (host, port, path) = split_url(&self.config.url)?;

        let boundary = multipart_boundary();
        let body = multipart_body(&boundary, bytes, params);
        let head = format!(
            "POST {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Connection: close\r\n\
             Content-Type: multipart/form-data; boundary={boundary}\r\n\
             Content-Length: {}\r\n\r\n",
            body.len()
        );

        let addr = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|err| format!("resolving {host}: {err}"))?
            .next()
            .ok_or_else(|| format!("no addresses for {host}"))?;

        let mut stream = TcpStream::connect_timeout(&addr, self.config.timeout)
            .map_err(|err| format!("connect: {err}"))?;
        stream
            .set_write_timeout(Some(time_left(deadline)?))
            .map_err(|err| format!("socket setup: {err}"))?;

        stream
            .write_all(head.as_bytes())
            .and_then(|()| stream.write_all(&body))
            .map_err(|err| format!("send: {err}"))?;
        // Everything is written; let the server see EOF so it can
        // respond without waiting on the connection.
        let _ = stream.shutdown(Shutdown::Write);

        // Chunked read, re-arming the socket timeout with the time
        // left before every read so the deadline bounds the total.
        let mut response = Vec::new();
        let mut chunk = [0; 4096];
        loop {
            stream
                .set_read_timeout(Some(time_left(deadline)?))
                .map_err(|err| format!("socket setup: {err}"))?;
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => response.extend_from_slice(&chunk[..read]),
                Err(err) => return Err(format!("receive: {err}")),
            }
        }

        parse_response(&response)
    }
}

impl EstimationTier for RemoteTier {
    fn method(&self) -> Method {
        Method::Remote
    }

    fn attempt(
        &self,
        bytes: &[u8],
        params: &PrintParameters,
    ) -> Result<VolumeBreakdown, EstimateError> {
        let response = self
            .request(bytes, params)
            .map_err(EstimateError::RemoteUnavailable)?;

        debug!(weight_grams = response.weight_grams, "remote estimate received");

        // The weight is authoritative; the volume fields are clamped
        // against each other and against the weight so the record
        // stays internally consistent when the service over-reports.
        let density = params.material_density as f64;
        let total = response.total_volume_cm3.unwrap_or(0.0).max(0.0);
        let shell = response.shell_volume_cm3.unwrap_or(0.0).clamp(0.0, total);
        let shell_mass = (shell * density).min(response.weight_grams);
        let material = (shell + response.infill_volume_cm3.unwrap_or(0.0).max(0.0)).min(total);

        Ok(VolumeBreakdown {
            total_volume_cm3: total,
            shell_volume_cm3: shell,
            interior_volume_cm3: total - shell,
            material_volume_cm3: material,
            shell_mass_g: shell_mass,
            interior_mass_g: (response.weight_grams - shell_mass).max(0.0),
            total_mass_g: response.weight_grams,
            method: Method::Remote,
            warning: response.total_volume_cm3.is_none(),
        })
    }
}

fn time_left(deadline: Instant) -> Result<Duration, String> {
    let now = Instant::now();
    (now < deadline)
        .then(|| deadline - now)
        .ok_or_else(|| "request deadline exceeded".to_owned())
}

fn split_url(url: &str) -> Result<(String, u16, String), String> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| format!("unsupported url: {url}"))?;

    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, format!("/{path}")),
        None => (rest, "/".to_owned()),
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (
            host.to_owned(),
            port.parse().map_err(|_| format!("bad port in {url}"))?,
        ),
        None => (authority.to_owned(), 80),
    };

    Ok((host, port, path))
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|x| x.subsec_nanos())
        .unwrap_or(0);
    format!("----estimator-{nanos:08x}")
}

fn multipart_body(boundary: &str, bytes: &[u8], params: &PrintParameters) -> Vec<u8> {
    let infill_percentage = params.clamped_infill() * 100.0;
    let fields = [
        ("infill_percentage", format!("{infill_percentage:.0}")),
        ("material_density", params.material_density.to_string()),
        ("line_thickness", LINE_THICKNESS.to_string()),
        ("layer_height", LAYER_HEIGHT.to_string()),
        ("shell_count", SHELL_COUNT.to_string()),
    ];

    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"{name}\"\r\n\r\n\
                 {value}\r\n"
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"mesh.stl\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    body
}

fn parse_response(response: &[u8]) -> Result<RemoteResponse, String> {
    let header_end = response
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .ok_or("response without headers")?;
    let (head, body) = response.split_at(header_end + 4);

    let status_line = head.split(|&b| b == b'\r').next().unwrap_or_default();
    let status = std::str::from_utf8(status_line)
        .ok()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or("unparsable status line")?;

    if status != 200 {
        return Err(format!("status {status}"));
    }

    // Tolerate chunked transfer encoding by parsing from the first
    // brace; the payload is a single json object.
    let json_start = body
        .iter()
        .position(|&b| b == b'{')
        .ok_or("no json in response body")?;
    let json_end = body
        .iter()
        .rposition(|&b| b == b'}')
        .ok_or("no json in response body")?;
    if json_end < json_start {
        return Err("no json in response body".into());
    }

    serde_json::from_slice(&body[json_start..=json_end]).map_err(|err| format!("bad json: {err}"))
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader},
        net::TcpListener,
        thread,
        time::Duration,
    };

    use super::*;

    /// One-shot HTTP server that consumes a request and replies with a
    /// canned response, returning the url to reach it at.
    fn stub_server(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/estimate-weight", listener.local_addr().unwrap());

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(&stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                if line.ends_with("\r\n\r\n") || line == "\r\n" {
                    break;
                }
                line.clear();
            }

            let mut rest = Vec::new();
            let _ = reader.read_to_end(&mut rest); // body until client EOF

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            );
            (&stream).write_all(response.as_bytes()).unwrap();
        });

        url
    }

    /// Server that answers one request a single byte at a time with a
    /// pause between bytes, keeping each individual read fast while
    /// stretching the response out past any reasonable total budget.
    fn drip_server(delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/estimate-weight", listener.local_addr().unwrap());

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let _ = BufReader::new(&stream).read_to_end(&mut request);

            let body = r#"{"weight_grams": 1.0}"#;
            let response =
                format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}", body.len());
            for byte in response.as_bytes() {
                if (&stream).write_all(&[*byte]).is_err() {
                    return;
                }
                thread::sleep(delay);
            }
        });

        url
    }

    fn tier(url: String) -> RemoteTier {
        RemoteTier::new(RemoteConfig {
            url,
            timeout: Duration::from_secs(2),
        })
    }

    #[test]
    fn successful_response_is_parsed() {
        let url = stub_server(
            "200 OK",
            r#"{"weight_grams": 355.1, "total_volume_cm3": 1000.0, "shell_volume_cm3": 108.0, "infill_volume_cm3": 178.4}"#,
        );

        let breakdown = tier(url)
            .attempt(&[0; 84], &PrintParameters::default())
            .unwrap();

        assert_eq!(breakdown.method, Method::Remote);
        assert!((breakdown.total_mass_g - 355.1).abs() < 1e-9);
        assert!((breakdown.total_volume_cm3 - 1000.0).abs() < 1e-9);
        assert!((breakdown.interior_volume_cm3 - 892.0).abs() < 1e-9);
        assert!(!breakdown.warning);
    }

    #[test]
    fn server_error_is_recoverable() {
        let url = stub_server("500 Internal Server Error", "{}");
        let err = tier(url)
            .attempt(&[0; 84], &PrintParameters::default())
            .unwrap_err();
        assert!(matches!(err, EstimateError::RemoteUnavailable(_)), "{err:?}");
    }

    #[test]
    fn missing_weight_is_recoverable() {
        let url = stub_server("200 OK", r#"{"volume": 12.0}"#);
        let err = tier(url)
            .attempt(&[0; 84], &PrintParameters::default())
            .unwrap_err();
        assert!(matches!(err, EstimateError::RemoteUnavailable(_)), "{err:?}");
    }

    #[test]
    fn slow_response_hits_the_request_deadline() {
        // Each 120 ms gap is comfortably inside a per-read timeout;
        // only a whole-request deadline can cut this off.
        let url = drip_server(Duration::from_millis(120));
        let start = Instant::now();

        let err = RemoteTier::new(RemoteConfig {
            url,
            timeout: Duration::from_millis(400),
        })
        .attempt(&[0; 84], &PrintParameters::default())
        .unwrap_err();

        assert!(matches!(err, EstimateError::RemoteUnavailable(_)), "{err:?}");
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "request ran {:?} past its 400 ms budget",
            start.elapsed()
        );
    }

    #[test]
    fn weight_only_response_is_flagged() {
        let url = stub_server("200 OK", r#"{"weight_grams": 42.0}"#);
        let breakdown = tier(url)
            .attempt(&[0; 84], &PrintParameters::default())
            .unwrap();

        assert!(breakdown.warning);
        assert_eq!(breakdown.total_volume_cm3, 0.0);
        assert_eq!(breakdown.shell_mass_g, 0.0);
        assert!((breakdown.total_mass_g - 42.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_shell_volume_is_clamped() {
        let url = stub_server(
            "200 OK",
            r#"{"weight_grams": 10.0, "total_volume_cm3": 5.0, "shell_volume_cm3": 10000.0}"#,
        );
        let breakdown = tier(url)
            .attempt(&[0; 84], &PrintParameters::default())
            .unwrap();

        assert!(breakdown.shell_volume_cm3 <= breakdown.total_volume_cm3);
        assert!(breakdown.interior_volume_cm3 >= 0.0);
        assert!(breakdown.shell_mass_g <= breakdown.total_mass_g + 1e-9);
    }

    #[test]
    fn connection_refused_is_recoverable() {
        let err = tier("http://127.0.0.1:1/estimate-weight".into())
            .attempt(&[0; 84], &PrintParameters::default())
            .unwrap_err();
        assert!(matches!(err, EstimateError::RemoteUnavailable(_)), "{err:?}");
    }

    #[test]
    fn url_splitting() {
        assert_eq!(
            split_url("http://localhost:8000/estimate-weight").unwrap(),
            ("localhost".into(), 8000, "/estimate-weight".into())
        );
        assert_eq!(
            split_url("http://example.com").unwrap(),
            ("example.com".into(), 80, "/".into())
        );
        assert!(split_url("https://example.com").is_err());
    }
}
