//! High-level client API.

use crate::connection::{Connection, ConnectionConfig, Response};
use crate::error::ClientError;
use std::net::SocketAddr;
use std::time::Duration;

/// High-level client for a devobj device.
pub struct Client {
    conn: Connection,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Connection::new(config),
        }
    }

    /// Creates a client with default settings and connects it.
    pub async fn connect_to(addr: SocketAddr) -> Result<Self, ClientError> {
        let mut client = Self::new(ConnectionConfig::new(addr));
        client.connect().await?;
        Ok(client)
    }

    /// Connects to the server.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Sends a raw request line and returns the response, whatever its status.
    pub async fn request(&mut self, line: &str) -> Result<Response, ClientError> {
        self.conn.request(line).await
    }

    /// Reads one object (bare value) or several (JSON array of values).
    pub async fn read(&mut self, names: &[&str]) -> Result<String, ClientError> {
        let line = match names {
            [name] => format!("!read {}", quote(name)?),
            names => format!("!read {}", quoted_list(names)?),
        };
        self.conn.request(&line).await?.into_result()
    }

    /// Writes all pairs or none. Values are JSON text, e.g. `14.4`,
    /// `true` or `"name"`.
    pub async fn write(&mut self, pairs: &[(&str, &str)]) -> Result<(), ClientError> {
        let mut body = String::from("{");
        for (i, (name, value)) in pairs.iter().enumerate() {
            if i > 0 {
                body.push_str(", ");
            }
            body.push_str(&quote(name)?);
            body.push_str(": ");
            body.push_str(value);
        }
        body.push('}');
        self.conn
            .request(&format!("!write {}", body))
            .await?
            .into_result()
            .map(|_| ())
    }

    /// Lists readable object names, optionally limited to a category.
    pub async fn list(&mut self, category: Option<&str>) -> Result<Vec<String>, ClientError> {
        let line = match category {
            Some(category) => format!("!list {}", quote(category)?),
            None => "!list".to_string(),
        };
        let payload = self.conn.request(&line).await?.into_result()?;
        parse_name_list(&payload)
    }

    /// Executes a function object.
    pub async fn exec(&mut self, name: &str) -> Result<(), ClientError> {
        let line = format!("!exec {}", quote(name)?);
        self.conn.request(&line).await?.into_result().map(|_| ())
    }

    /// Waits for the next publication message.
    pub async fn next_publication(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<String, ClientError> {
        self.conn.next_publication(timeout).await
    }
}

/// Strings are sent unescaped, so a name must not contain quotes.
fn quote(name: &str) -> Result<String, ClientError> {
    if name.contains(['"', '\\']) || name.chars().any(char::is_control) {
        return Err(ClientError::InvalidRequest(format!(
            "name {:?} cannot be sent unescaped",
            name
        )));
    }
    Ok(format!("\"{}\"", name))
}

fn quoted_list(names: &[&str]) -> Result<String, ClientError> {
    let quoted = names
        .iter()
        .map(|name| quote(name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("[{}]", quoted.join(", ")))
}

/// Parses a `["a", "b"]` payload into names.
fn parse_name_list(payload: &str) -> Result<Vec<String>, ClientError> {
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devobj_protocol::Status;
    use devobj_server::{DemoDevice, DeviceOptions, DeviceThread, Server, ServerConfig};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn start(options: DeviceOptions) -> (SocketAddr, Arc<Server>, DeviceThread) {
        let device = DeviceThread::spawn(DemoDevice::new, options).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::new(ServerConfig::default(), device.handle()));
        let runner = server.clone();
        tokio::spawn(async move { runner.serve(listener).await });
        (addr, server, device)
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("Bat_V").unwrap(), "\"Bat_V\"");
        assert!(quote("a\"b").is_err());
        assert_eq!(quoted_list(&["a", "b"]).unwrap(), "[\"a\", \"b\"]");
        assert_eq!(quoted_list(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_parse_name_list() {
        assert!(parse_name_list("[]").unwrap().is_empty());
        assert_eq!(
            parse_name_list("[\"Solar_V\", \"Bat_V\"]").unwrap(),
            vec!["Solar_V", "Bat_V"]
        );
        assert_eq!(
            parse_name_list("[\"a,b\", \"c\"]").unwrap(),
            vec!["a,b", "c"]
        );
        assert!(matches!(
            parse_name_list("[\"unterminated"),
            Err(ClientError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_read_write_round_trip() {
        let (addr, server, _device) = start(DeviceOptions::default()).await;
        let mut client = Client::connect_to(addr).await.unwrap();

        assert_eq!(client.read(&["Manufacturer"]).await.unwrap(), "\"Libre Solar\"");

        client
            .write(&[("BatCharge_V", "14.1"), ("Nickname", "\"shed\"")])
            .await
            .unwrap();
        assert_eq!(
            client.read(&["BatCharge_V", "Nickname"]).await.unwrap(),
            "[14.10, \"shed\"]"
        );

        server.shutdown();
    }

    #[tokio::test]
    async fn test_errors_carry_status() {
        let (addr, server, _device) = start(DeviceOptions::default()).await;
        let mut client = Client::connect_to(addr).await.unwrap();

        let err = client.read(&["Nope"]).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::UnknownObject));

        let err = client.write(&[("Bat_V", "1.0")]).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::Unauthorized));

        let response = client.request("!bogus").await.unwrap();
        assert_eq!(response.status, Status::UnknownFunction);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_list_and_exec() {
        let (addr, server, _device) = start(DeviceOptions::default()).await;
        let mut client = Client::connect_to(addr).await.unwrap();

        let names = client.list(Some("input")).await.unwrap();
        assert_eq!(names, vec!["Solar_V", "Bat_V", "BatTemp_degC"]);
        assert!(client.list(None).await.unwrap().len() > names.len());

        client.exec("reset").await.unwrap();
        assert_eq!(client.read(&["SolarInTotal_Wh"]).await.unwrap(), "0");

        server.shutdown();
    }

    #[tokio::test]
    async fn test_publications() {
        let options =
            DeviceOptions::default().with_publish(Duration::from_millis(20), vec![0x1004]);
        let (addr, server, _device) = start(options).await;
        let mut client = Client::connect_to(addr).await.unwrap();

        let publication = client
            .next_publication(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(publication, "# {\"DeviceID\":12648430}");

        // Requests still work while publications keep arriving.
        assert_eq!(client.read(&["DeviceID"]).await.unwrap(), "12648430");

        server.shutdown();
    }
}
