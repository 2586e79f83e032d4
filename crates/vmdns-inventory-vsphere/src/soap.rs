//! vim25 SOAP request bodies and response unwrapping
//!
//! Only the handful of methods a read-only inventory walk needs are
//! modelled. Every builder returns the complete envelope.

use quick_xml::escape::escape;

use crate::xml::Element;

/// SOAPAction header value
pub(crate) const SOAP_ACTION: &str = "urn:vim25/7.0";

/// Upper bound on objects per RetrievePropertiesEx page
const MAX_OBJECTS_PER_PAGE: usize = 1000;

/// A managed object reference (`<x type="VirtualMachine">vm-42</x>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MoRef {
    pub kind: String,
    pub value: String,
}

impl MoRef {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Read a reference from an element carrying a `type` attribute
    pub fn from_element(element: &Element) -> Option<Self> {
        let kind = element.attr("type")?;
        let value = element.text();
        if value.is_empty() {
            return None;
        }
        Some(Self::new(kind, value))
    }

    fn to_xml(&self, tag: &str) -> String {
        format!(
            r#"<{tag} type="{}">{}</{tag}>"#,
            escape(self.kind.as_str()),
            escape(self.value.as_str())
        )
    }
}

/// Errors surfaced by a SOAP exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum SoapError {
    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),
    /// The server answered with a SOAP fault
    #[error("SOAP fault: {0}")]
    Fault(String),
    /// The response was not the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),
}

fn envelope(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<soapenv:Body>{}</soapenv:Body></soapenv:Envelope>"#
        ),
        body
    )
}

pub(crate) fn retrieve_service_content() -> String {
    envelope(concat!(
        r#"<RetrieveServiceContent xmlns="urn:vim25">"#,
        r#"<_this type="ServiceInstance">ServiceInstance</_this>"#,
        r#"</RetrieveServiceContent>"#
    ))
}

pub(crate) fn login(session_manager: &MoRef, username: &str, password: &str) -> String {
    envelope(&format!(
        r#"<Login xmlns="urn:vim25">{}<userName>{}</userName><password>{}</password></Login>"#,
        session_manager.to_xml("_this"),
        escape(username),
        escape(password)
    ))
}

pub(crate) fn logout(session_manager: &MoRef) -> String {
    envelope(&format!(
        r#"<Logout xmlns="urn:vim25">{}</Logout>"#,
        session_manager.to_xml("_this")
    ))
}

pub(crate) fn create_container_view(view_manager: &MoRef, container: &MoRef, kind: &str) -> String {
    envelope(&format!(
        r#"<CreateContainerView xmlns="urn:vim25">{}{}<type>{}</type><recursive>true</recursive></CreateContainerView>"#,
        view_manager.to_xml("_this"),
        container.to_xml("container"),
        escape(kind)
    ))
}

pub(crate) fn destroy_view(view: &MoRef) -> String {
    envelope(&format!(
        r#"<DestroyView xmlns="urn:vim25">{}</DestroyView>"#,
        view.to_xml("_this")
    ))
}

/// One batched property retrieval over explicit object references
pub(crate) fn retrieve_properties(
    property_collector: &MoRef,
    kind: &str,
    objects: &[MoRef],
    paths: &[&str],
) -> String {
    let path_set: String = paths
        .iter()
        .map(|p| format!("<pathSet>{}</pathSet>", escape(*p)))
        .collect();

    let object_set: String = objects
        .iter()
        .map(|obj| format!("<objectSet>{}<skip>false</skip></objectSet>", obj.to_xml("obj")))
        .collect();

    envelope(&format!(
        concat!(
            r#"<RetrievePropertiesEx xmlns="urn:vim25">{}"#,
            r#"<specSet><propSet><type>{}</type>{}</propSet>{}</specSet>"#,
            r#"<options><maxObjects>{}</maxObjects></options>"#,
            r#"</RetrievePropertiesEx>"#
        ),
        property_collector.to_xml("_this"),
        escape(kind),
        path_set,
        object_set,
        MAX_OBJECTS_PER_PAGE
    ))
}

pub(crate) fn continue_retrieve_properties(property_collector: &MoRef, token: &str) -> String {
    envelope(&format!(
        r#"<ContinueRetrievePropertiesEx xmlns="urn:vim25">{}<token>{}</token></ContinueRetrievePropertiesEx>"#,
        property_collector.to_xml("_this"),
        escape(token)
    ))
}

/// Unwrap a response envelope into the method response element
///
/// Faults are reported as [`SoapError::Fault`] with the server's
/// `faultstring`.
pub(crate) fn parse_response(xml: &str) -> Result<Element, SoapError> {
    let root = Element::parse(xml).map_err(SoapError::Malformed)?;
    if root.name != "Envelope" {
        return Err(SoapError::Malformed(format!(
            "expected SOAP envelope, got <{}>",
            root.name
        )));
    }

    let body = root
        .take_child("Body")
        .ok_or_else(|| SoapError::Malformed("missing SOAP body".to_string()))?;

    let response = body
        .children
        .into_iter()
        .next()
        .ok_or_else(|| SoapError::Malformed("empty SOAP body".to_string()))?;

    if response.name == "Fault" {
        let message = response
            .child("faultstring")
            .map(|s| s.text().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unspecified fault".to_string());
        return Err(SoapError::Fault(message));
    }

    Ok(response)
}

/// One object from a RetrieveResult with its property values
#[derive(Debug, Clone)]
pub(crate) struct ObjectContent {
    pub obj: MoRef,
    pub props: Vec<(String, Element)>,
}

impl ObjectContent {
    /// Raw value element of a property
    pub fn value(&self, path: &str) -> Option<&Element> {
        self.props
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, val)| val)
    }

    /// Text of the first listed property that is set and non-empty
    pub fn first_text(&self, paths: &[&str]) -> Option<&str> {
        paths
            .iter()
            .filter_map(|p| self.value(p))
            .map(|val| val.text())
            .find(|text| !text.is_empty())
    }
}

/// Split a RetrieveResult into its objects and continuation token
pub(crate) fn parse_retrieve_result(
    result: &Element,
) -> Result<(Vec<ObjectContent>, Option<String>), SoapError> {
    let mut objects = Vec::new();

    for content in result.children_named("objects") {
        let obj = content
            .child("obj")
            .and_then(MoRef::from_element)
            .ok_or_else(|| SoapError::Malformed("object content without reference".to_string()))?;

        let props = content
            .children_named("propSet")
            .filter_map(|prop| {
                let name = prop.child("name")?.text().to_string();
                let val = prop.child("val")?.clone();
                Some((name, val))
            })
            .collect();

        objects.push(ObjectContent { obj, props });
    }

    let token = result
        .child("token")
        .map(|t| t.text().to_string())
        .filter(|t| !t.is_empty());

    Ok((objects, token))
}
