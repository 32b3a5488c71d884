//! WeMo device profile: description document, SOAP envelopes and control
//! request parsing.
//!
//! Hubs that speak the Belkin protocol fetch `setup.xml` to learn the device
//! name and control URL, then POST `GetBinaryState` / `SetBinaryState` SOAP
//! actions to the basicevent control endpoint.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::protocol_constants::{
    BINARY_STATE_ELEMENT, SET_STATE_MARKER, WEMO_DEVICE_TYPE, WEMO_SERVICE_TYPE,
};

/// Identity of the emulated device, as published in `setup.xml`.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub friendly_name: String,
    pub uuid: String,
    pub serial: String,
    /// Control URL path, including any URI prefix.
    pub control_url: String,
    /// Event subscription URL path, including any URI prefix.
    pub event_url: String,
}

/// Renders the UPnP device description.
pub fn build_setup_xml(info: &DeviceInfo) -> String {
    format!(
        r#"<?xml version="1.0"?>
<root xmlns="urn:Belkin:device-1-0">
  <specVersion>
    <major>1</major>
    <minor>0</minor>
  </specVersion>
  <device>
    <deviceType>{device_type}</deviceType>
    <friendlyName>{name}</friendlyName>
    <manufacturer>Belkin International Inc.</manufacturer>
    <modelName>Emulated Socket</modelName>
    <modelNumber>3.1415</modelNumber>
    <manufacturerURL>http://www.belkin.com</manufacturerURL>
    <modelDescription>Belkin Plugin Socket 1.0</modelDescription>
    <modelURL>http://www.belkin.com/plugin/</modelURL>
    <UDN>uuid:{uuid}</UDN>
    <serialNumber>{serial}</serialNumber>
    <binaryState>0</binaryState>
    <serviceList>
      <service>
        <serviceType>{service_type}</serviceType>
        <serviceId>urn:Belkin:serviceId:basicevent1</serviceId>
        <controlURL>{control_url}</controlURL>
        <eventSubURL>{event_url}</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#,
        device_type = WEMO_DEVICE_TYPE,
        name = html_escape::encode_text(&info.friendly_name),
        uuid = html_escape::encode_text(&info.uuid),
        serial = html_escape::encode_text(&info.serial),
        service_type = WEMO_SERVICE_TYPE,
        control_url = html_escape::encode_text(&info.control_url),
        event_url = html_escape::encode_text(&info.event_url),
    )
}

/// The SOAP action a control request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Report the current state.
    Get,
    /// Change the state, then report it.
    Set(bool),
}

impl ControlAction {
    /// Method name used in the response tag (`GetBinaryStateResponse`, ...).
    pub fn method(&self) -> &'static str {
        match self {
            Self::Get => "Get",
            Self::Set(_) => "Set",
        }
    }
}

/// Classifies a control request body.
///
/// Any body mentioning `SetBinaryState` is a set request; its `BinaryState`
/// value turns the switch on only when it is exactly `1`. Everything else,
/// including unparseable bodies, is treated as a get.
pub fn parse_control_request(body: &str) -> ControlAction {
    if !body.contains(SET_STATE_MARKER) {
        return ControlAction::Get;
    }
    let on = extract_xml_text(body, BINARY_STATE_ELEMENT).as_deref() == Some("1");
    ControlAction::Set(on)
}

/// Renders the SOAP response for `action` reporting `state`.
pub fn build_binary_state_response(action: ControlAction, state: bool) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{method}BinaryStateResponse xmlns:u="{service}"><BinaryState>{state}</BinaryState></u:{method}BinaryStateResponse></s:Body></s:Envelope>"#,
        method = action.method(),
        service = WEMO_SERVICE_TYPE,
        state = u8::from(state),
    )
}

/// Extracts text content from the first occurrence of an XML element.
///
/// Matches by local name, so namespace prefixes are ignored. Returns `None` if
/// the element is missing or the document is malformed before it.
pub fn extract_xml_text(xml: &str, element_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let target = element_name.as_bytes();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == target => {
                return reader
                    .read_text(e.name())
                    .ok()
                    .map(|text| html_escape::decode_html_entities(&text).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}
