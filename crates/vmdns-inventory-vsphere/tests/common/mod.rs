//! Mock vCenter for the vim25 SOAP tests
//!
//! Every handler is matched on POST /sdk plus body fragments. Fragments
//! are chosen so that no two handlers accept the same request.

#![allow(dead_code)]

use vmdns_core::config::InventoryConfig;
use vmdns_inventory_vsphere::VsphereSource;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ROOT_FOLDER: &str = "group-d1";
pub const DATACENTER: &str = "datacenter-2";

pub fn envelope(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<soapenv:Body>{}</soapenv:Body></soapenv:Envelope>"#
        ),
        body
    )
}

pub fn fault(message: &str) -> String {
    envelope(&format!(
        "<soapenv:Fault><faultcode>ServerFaultCode</faultcode><faultstring>{}</faultstring></soapenv:Fault>",
        message
    ))
}

/// One object of a RetrievePropertiesEx result
pub struct Object<'a> {
    pub kind: &'a str,
    pub id: &'a str,
    pub props: Vec<(&'a str, &'a str)>,
}

pub fn object<'a>(kind: &'a str, id: &'a str, props: &[(&'a str, &'a str)]) -> Object<'a> {
    Object {
        kind,
        id,
        props: props.to_vec(),
    }
}

fn object_xml(object: &Object<'_>) -> String {
    let props: String = object
        .props
        .iter()
        .map(|(name, val)| {
            format!(
                r#"<propSet><name>{}</name><val xsi:type="xsd:string">{}</val></propSet>"#,
                name, val
            )
        })
        .collect();
    format!(
        r#"<objects><obj type="{}">{}</obj>{}</objects>"#,
        object.kind, object.id, props
    )
}

pub fn properties_page(objects: &[Object<'_>], token: Option<&str>) -> String {
    let token = token
        .map(|t| format!("<token>{}</token>", t))
        .unwrap_or_default();
    let objects: String = objects.iter().map(object_xml).collect();
    envelope(&format!(
        r#"<RetrievePropertiesExResponse xmlns="urn:vim25"><returnval>{}{}</returnval></RetrievePropertiesExResponse>"#,
        token, objects
    ))
}

pub struct MockVcenter {
    pub server: MockServer,
}

impl MockVcenter {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn source(&self) -> VsphereSource {
        VsphereSource::new(&InventoryConfig {
            endpoint: self.server.uri(),
            username: "administrator@vsphere.local".to_string(),
            password: "secret_password_123".to_string(),
            insecure_tls: false,
        })
        .expect("mock endpoint is a valid URL")
    }

    /// Mount a handler answering requests whose body contains every fragment
    pub async fn on(&self, fragments: &[&str], status: u16, body: String) {
        self.on_times(fragments, status, body, None).await;
    }

    pub async fn on_times(
        &self,
        fragments: &[&str],
        status: u16,
        body: String,
        times: Option<u64>,
    ) {
        let mut mock = Mock::given(method("POST")).and(path("/sdk"));
        for fragment in fragments {
            mock = mock.and(body_string_contains(*fragment));
        }
        let mock = mock.respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "text/xml; charset=utf-8")
                .set_body_string(body),
        );
        match times {
            Some(n) => mock.expect(n).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    pub async fn service_content(&self) {
        self.on(
            &["<RetrieveServiceContent"],
            200,
            envelope(&format!(
                concat!(
                    r#"<RetrieveServiceContentResponse xmlns="urn:vim25"><returnval>"#,
                    r#"<rootFolder type="Folder">{}</rootFolder>"#,
                    r#"<propertyCollector type="PropertyCollector">propertyCollector</propertyCollector>"#,
                    r#"<viewManager type="ViewManager">ViewManager</viewManager>"#,
                    r#"<sessionManager type="SessionManager">SessionManager</sessionManager>"#,
                    r#"<about><name>VMware vCenter Server</name><apiVersion>7.0.3.0</apiVersion></about>"#,
                    r#"</returnval></RetrieveServiceContentResponse>"#
                ),
                ROOT_FOLDER
            )),
        )
        .await;
    }

    pub async fn login_ok(&self) {
        self.on(
            &["<Login "],
            200,
            envelope(concat!(
                r#"<LoginResponse xmlns="urn:vim25"><returnval>"#,
                r#"<key>52b3a5c1-0000-0000-0000-000000000000</key>"#,
                r#"<userName>VSPHERE.LOCAL\Administrator</userName>"#,
                r#"</returnval></LoginResponse>"#
            )),
        )
        .await;
    }

    pub async fn logout(&self, times: u64) {
        self.on_times(
            &["<Logout "],
            200,
            envelope(r#"<LogoutResponse xmlns="urn:vim25"/>"#),
            Some(times),
        )
        .await;
    }

    pub async fn destroy_view(&self) {
        self.on(
            &["<DestroyView "],
            200,
            envelope(r#"<DestroyViewResponse xmlns="urn:vim25"/>"#),
        )
        .await;
    }

    /// A container view of `kind` below `container` holding `members`
    pub async fn view(&self, kind: &str, container: &str, view_id: &str, members: &[&str]) {
        let create_kind = format!("<type>{}</type>", kind);
        let create_container = format!(">{}</container>", container);
        self.on(
            &["<CreateContainerView ", &create_kind, &create_container],
            200,
            envelope(&format!(
                r#"<CreateContainerViewResponse xmlns="urn:vim25"><returnval type="ContainerView">{}</returnval></CreateContainerViewResponse>"#,
                view_id
            )),
        )
        .await;

        let refs: String = members
            .iter()
            .map(|id| {
                format!(
                    r#"<ManagedObjectReference xsi:type="ManagedObjectReference" type="{}">{}</ManagedObjectReference>"#,
                    kind, id
                )
            })
            .collect();
        let read_view = format!(r#"<obj type="ContainerView">{}</obj>"#, view_id);
        self.on(
            &["<RetrievePropertiesEx ", &read_view],
            200,
            envelope(&format!(
                concat!(
                    r#"<RetrievePropertiesExResponse xmlns="urn:vim25"><returnval><objects>"#,
                    r#"<obj type="ContainerView">{}</obj>"#,
                    r#"<propSet><name>view</name><val xsi:type="ArrayOfManagedObjectReference">{}</val></propSet>"#,
                    r#"</objects></returnval></RetrievePropertiesExResponse>"#
                ),
                view_id, refs
            )),
        )
        .await;
    }

    /// Root folder holding the given datacenters, each named `DC<n>`
    pub async fn datacenters(&self, ids: &[&str]) {
        self.view("Datacenter", ROOT_FOLDER, "session[dc]view-1", ids).await;
        for (i, id) in ids.iter().enumerate() {
            let name = format!("DC{}", i + 1);
            let obj = format!(r#"<obj type="Datacenter">{}</obj>"#, id);
            self.on(
                &["<RetrievePropertiesEx ", &obj],
                200,
                properties_page(&[object("Datacenter", id, &[("name", name.as_str())])], None),
            )
            .await;
        }
    }

    /// Property pages for `kind`, served in request order
    pub async fn properties(&self, kind: &str, objects: &[Object<'_>]) {
        let prop_kind = format!("<propSet><type>{}</type>", kind);
        self.on(
            &["<RetrievePropertiesEx ", &prop_kind],
            200,
            properties_page(objects, None),
        )
        .await;
    }

    /// Everything needed for connect to succeed against one datacenter
    pub async fn healthy(&self) {
        self.service_content().await;
        self.login_ok().await;
        self.destroy_view().await;
        self.datacenters(&[DATACENTER]).await;
    }

    /// Bodies of all requests received so far
    pub async fn bodies(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }
}
