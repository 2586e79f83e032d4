// # vSphere Inventory Source
//
// This crate reads VMs and hosts from a vCenter Server through the vim25
// SOAP API (`<endpoint>/sdk`).
//
// ## Session Flow
//
// 1. `RetrieveServiceContent` locates the root folder, property collector,
//    view manager and session manager
// 2. `Login` opens a session; the session cookie lives in the client's jar
// 3. The default datacenter is the only Datacenter below the root folder
// 4. Listing a kind creates a recursive ContainerView on the datacenter,
//    reads its object references, destroys the view and then fetches the
//    needed properties for all references in one batched
//    `RetrievePropertiesEx` call (following continuation tokens)
// 5. `Logout` ends the session
//
// ## Architectural Constraints
//
// - Read-only: no method that mutates the inventory is ever sent
// - No retry, no backoff, no caching between calls
// - No request timeout; only the store side bounds its dial
//
// ## Security Requirements
//
// - The password NEVER appears in logs or Debug output
// - TLS verification is on unless `insecure_tls` is set, which is logged
//   as a warning on every connect

mod soap;
mod xml;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info, warn};
use vmdns_core::config::InventoryConfig;
use vmdns_core::traits::{InventorySession, InventorySource};
use vmdns_core::{Error, InventoryEntry, Result};

use soap::{MoRef, ObjectContent, SoapError};
use xml::Element;

/// Properties read for each VM, configured name first
const VM_NAME_PATHS: &[&str] = &["config.name", "name"];
const VM_IP_PATH: &str = "summary.guest.ipAddress";

/// Properties read for each host, configured name first
const HOST_NAME_PATHS: &[&str] = &["summary.config.name", "name"];
const HOST_IP_PATH: &str = "summary.managementServerIp";

/// vSphere inventory source
///
/// Holds the parsed endpoint and credentials. Every [`connect`] builds a
/// fresh HTTP client, so sessions never share cookies.
///
/// [`connect`]: InventorySource::connect
pub struct VsphereSource {
    /// SDK endpoint, e.g. `https://vcsa.corp.local/sdk`
    sdk_url: Url,

    /// User name for Login
    username: String,

    /// Password for Login
    /// ⚠️ NEVER log this value
    password: String,

    /// Accept any TLS certificate
    insecure_tls: bool,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for VsphereSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsphereSource")
            .field("sdk_url", &self.sdk_url.as_str())
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("insecure_tls", &self.insecure_tls)
            .finish()
    }
}

impl VsphereSource {
    /// Create a source from the inventory configuration
    ///
    /// A malformed endpoint URL is reported as `Error::Config`. An endpoint
    /// without a path is pointed at `/sdk`; credentials embedded in the
    /// URL are discarded in favour of the configured ones.
    pub fn new(config: &InventoryConfig) -> Result<Self> {
        let mut sdk_url = Url::parse(&config.endpoint).map_err(|e| {
            Error::config(format!("Invalid inventory endpoint '{}': {}", config.endpoint, e))
        })?;

        if sdk_url.cannot_be_a_base() || !matches!(sdk_url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Inventory endpoint must be an http(s) URL. Got: {}",
                config.endpoint
            )));
        }

        if sdk_url.path().is_empty() || sdk_url.path() == "/" {
            sdk_url.set_path("/sdk");
        }
        // Both setters only fail for cannot-be-a-base URLs, excluded above.
        let _ = sdk_url.set_username("");
        let _ = sdk_url.set_password(None);

        Ok(Self {
            sdk_url,
            username: config.username.clone(),
            password: config.password.clone(),
            insecure_tls: config.insecure_tls,
        })
    }

    /// SDK endpoint the source talks to
    pub fn sdk_url(&self) -> &Url {
        &self.sdk_url
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        if self.insecure_tls {
            warn!(
                "TLS certificate verification is DISABLED for {}",
                self.sdk_url.host_str().unwrap_or_default()
            );
        }

        reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(self.insecure_tls)
            .build()
            .map_err(|e| Error::network(format!("Failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl InventorySource for VsphereSource {
    async fn connect(&self) -> Result<Box<dyn InventorySession>> {
        let client = SoapClient {
            http: self.build_client()?,
            url: self.sdk_url.clone(),
        };

        info!("Connecting to {}", self.sdk_url);

        let content = client
            .call(soap::retrieve_service_content())
            .await
            .map_err(|e| Error::network(format!("RetrieveServiceContent failed: {}", e)))
            .and_then(|response| ServiceContent::from_response(&response))?;

        client
            .call(soap::login(&content.session_manager, &self.username, &self.password))
            .await
            .map_err(|e| match e {
                SoapError::Transport(msg) => Error::network(format!("Login failed: {}", msg)),
                other => Error::auth(other.to_string()),
            })?;

        debug!("Logged in as {}", self.username);

        let mut session = VsphereSession {
            soap: client,
            content,
            datacenter: MoRef::new("Datacenter", ""),
            datacenter_name: String::new(),
        };

        if let Err(e) = session.resolve_default_datacenter().await {
            if let Err(logout_err) = session.logout().await {
                warn!("Logout after failed datacenter lookup failed: {}", logout_err);
            }
            return Err(e);
        }

        info!("Using datacenter {}", session.datacenter_name);
        Ok(Box::new(session))
    }

    fn source_name(&self) -> &'static str {
        "vsphere"
    }
}

/// HTTP transport for SOAP envelopes
struct SoapClient {
    http: reqwest::Client,
    url: Url,
}

impl SoapClient {
    /// POST an envelope and unwrap the method response
    async fn call(&self, envelope: String) -> std::result::Result<Element, SoapError> {
        let response = self
            .http
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", soap::SOAP_ACTION)
            .body(envelope)
            .send()
            .await
            .map_err(|e| SoapError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SoapError::Transport(e.to_string()))?;

        // Faults arrive as HTTP 500 with a SOAP body; prefer the fault text.
        match soap::parse_response(&body) {
            Err(SoapError::Malformed(msg)) if !status.is_success() => {
                Err(SoapError::Transport(format!("HTTP {}: {}", status, msg)))
            }
            other => other,
        }
    }
}

/// Managed objects named by the service content
#[derive(Debug, Clone)]
struct ServiceContent {
    root_folder: MoRef,
    property_collector: MoRef,
    view_manager: MoRef,
    session_manager: MoRef,
}

impl ServiceContent {
    fn from_response(response: &Element) -> Result<Self> {
        let returnval = response
            .child("returnval")
            .ok_or_else(|| Error::network("RetrieveServiceContent returned no content"))?;

        let reference = |name: &str| {
            returnval
                .child(name)
                .and_then(MoRef::from_element)
                .ok_or_else(|| Error::network(format!("Service content lacks {}", name)))
        };

        Ok(Self {
            root_folder: reference("rootFolder")?,
            property_collector: reference("propertyCollector")?,
            view_manager: reference("viewManager")?,
            session_manager: reference("sessionManager")?,
        })
    }
}

/// Logged-in session scoped to the default datacenter
pub struct VsphereSession {
    soap: SoapClient,
    content: ServiceContent,
    datacenter: MoRef,
    datacenter_name: String,
}

impl VsphereSession {
    async fn resolve_default_datacenter(&mut self) -> Result<()> {
        let root = self.content.root_folder.clone();
        let datacenters = self
            .list_refs(&root, "Datacenter")
            .await
            .map_err(|e| Error::no_datacenter(e.to_string()))?;

        let datacenter = match datacenters.as_slice() {
            [] => return Err(Error::no_datacenter("no datacenter found")),
            [only] => only.clone(),
            many => {
                return Err(Error::no_datacenter(format!(
                    "default datacenter resolves to {} instances",
                    many.len()
                )));
            }
        };

        let objects = self
            .retrieve(std::slice::from_ref(&datacenter), "Datacenter", &["name"])
            .await
            .map_err(|e| Error::no_datacenter(e.to_string()))?;

        self.datacenter_name = objects
            .first()
            .and_then(|o| o.first_text(&["name"]))
            .unwrap_or(datacenter.value.as_str())
            .to_string();
        self.datacenter = datacenter;
        Ok(())
    }

    /// Every object of `kind` below `container`, via a temporary ContainerView
    async fn list_refs(
        &self,
        container: &MoRef,
        kind: &str,
    ) -> std::result::Result<Vec<MoRef>, SoapError> {
        let response = self
            .soap
            .call(soap::create_container_view(
                &self.content.view_manager,
                container,
                kind,
            ))
            .await?;

        let view = response
            .child("returnval")
            .and_then(MoRef::from_element)
            .ok_or_else(|| {
                SoapError::Malformed("CreateContainerView returned no view".to_string())
            })?;

        let result = self.read_view(&view).await;

        if let Err(e) = self.soap.call(soap::destroy_view(&view)).await {
            warn!("Failed to destroy container view {}: {}", view.value, e);
        }

        result
    }

    async fn read_view(&self, view: &MoRef) -> std::result::Result<Vec<MoRef>, SoapError> {
        let objects = self
            .retrieve(std::slice::from_ref(view), "ContainerView", &["view"])
            .await?;

        Ok(objects
            .iter()
            .filter_map(|o| o.value("view"))
            .flat_map(|val| val.children.iter().filter_map(MoRef::from_element))
            .collect())
    }

    /// Fetch `paths` for all `objects` in one batched call
    async fn retrieve(
        &self,
        objects: &[MoRef],
        kind: &str,
        paths: &[&str],
    ) -> std::result::Result<Vec<ObjectContent>, SoapError> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }

        let collector = &self.content.property_collector;
        let mut response = self
            .soap
            .call(soap::retrieve_properties(collector, kind, objects, paths))
            .await?;

        let mut contents = Vec::new();
        loop {
            // An empty result set comes back without a returnval.
            let token = match response.child("returnval") {
                Some(result) => {
                    let (page, token) = soap::parse_retrieve_result(result)?;
                    contents.extend(page);
                    token
                }
                None => None,
            };

            match token {
                Some(token) => {
                    debug!("Continuing property retrieval for {}", kind);
                    response = self
                        .soap
                        .call(soap::continue_retrieve_properties(collector, &token))
                        .await?;
                }
                None => break,
            }
        }

        Ok(contents)
    }

    async fn list_entries<'a>(
        &self,
        kind: &str,
        name_paths: &[&'a str],
        ip_path: &'a str,
    ) -> Result<Vec<(String, String)>> {
        let refs = self
            .list_refs(&self.datacenter, kind)
            .await
            .map_err(|e| Error::query(format!("Listing {} failed: {}", kind, e)))?;

        debug!("Resolved {} {} reference(s)", refs.len(), kind);

        let mut paths = name_paths.to_vec();
        paths.push(ip_path);

        let objects = self
            .retrieve(&refs, kind, &paths)
            .await
            .map_err(|e| Error::query(format!("Retrieving {} properties failed: {}", kind, e)))?;

        Ok(objects
            .iter()
            .map(|o| {
                let name = o.first_text(name_paths).unwrap_or_default().to_string();
                let ip = o.first_text(&[ip_path]).unwrap_or_default().to_string();
                (name, ip)
            })
            .collect())
    }

    async fn logout(&self) -> Result<()> {
        self.soap
            .call(soap::logout(&self.content.session_manager))
            .await
            .map(|_| ())
            .map_err(|e| Error::network(format!("Logout failed: {}", e)))
    }
}

#[async_trait]
impl InventorySession for VsphereSession {
    fn datacenter(&self) -> &str {
        &self.datacenter_name
    }

    async fn list_vms(&self) -> Result<Vec<InventoryEntry>> {
        let entries = self
            .list_entries("VirtualMachine", VM_NAME_PATHS, VM_IP_PATH)
            .await?;
        Ok(entries
            .into_iter()
            .map(|(name, ip)| InventoryEntry::vm(name, ip))
            .collect())
    }

    async fn list_hosts(&self) -> Result<Vec<InventoryEntry>> {
        let entries = self
            .list_entries("HostSystem", HOST_NAME_PATHS, HOST_IP_PATH)
            .await?;
        Ok(entries
            .into_iter()
            .map(|(name, ip)| InventoryEntry::host(name, ip))
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.logout().await?;
        debug!("Logged out of {}", self.soap.url);
        Ok(())
    }
}
