//! [`OltAdapter`] for ZTE ZXA10 OLTs.

use std::sync::LazyLock;

use async_trait::async_trait;
use log::{debug, info};
use secrecy::ExposeSecret;
use zeroize::Zeroizing;

use super::commands::{self, GponIndex};
use super::parser::ZteParser;
use crate::adapter::{
    AdapterConfig, AlertThresholds, DhcpConfig, InterfaceConfig, IpConfig, OltAdapter, OntRef,
    Operation, ProvisionRequest, RoutingMode, ServiceVlan, SpeedLimit, Tr069Config,
    TriplePlayConfig, VlanConfig, check_cli_word, check_output, check_outputs,
};
use crate::channel::Expect;
use crate::error::{Error, Result};
use crate::model::{
    AlertRecord, GpsLocation, OltInfo, OntLocation, OntRecord, OpticalMetrics, SignalSample,
};
use crate::parser::VendorParser;
use crate::session::{CommandOptions, SessionState, TransportSession};
use crate::transport::Transport;
use crate::vendors::{VendorProfile, hostname_from_prompt};

static CONFIRM: LazyLock<Expect> = LazyLock::new(|| {
    Expect::pattern(r"\[yes/no\]|[#>]\s*$").expect("valid confirmation pattern")
});

/// Logged and reported in place of the ACS line, which carries the password.
const TR069_ACS: &str = "tr069-mgmt 1 acs";

/// ZTE C300/C320/C600 adapter.
///
/// Vendor options read from [`AdapterConfig::options`]: `gpon_index` (PON
/// port used when an [`OntRef`] carries no location, default `1/1/1`),
/// `ont_type` (ONU type for provisioning requests that name none) and
/// `gemport` (default 1).
pub struct ZteAdapter {
    session: TransportSession,
    parser: ZteParser,
    profile: VendorProfile,
    default_index: GponIndex,
    model: Option<String>,
    onu_type: Option<String>,
    gemport: u16,
}

impl ZteAdapter {
    /// Build a disconnected adapter.
    pub fn new(config: AdapterConfig) -> Result<Self> {
        let profile = super::profile();
        let session_config =
            config.session_config(profile.default_protocol, &profile.on_open_commands())?;
        Self::build(&config, profile, TransportSession::new(session_config))
    }

    /// Build an adapter over a caller-supplied transport.
    pub fn with_transport(config: AdapterConfig, transport: Box<dyn Transport>) -> Result<Self> {
        let profile = super::profile();
        let session_config =
            config.session_config(profile.default_protocol, &profile.on_open_commands())?;
        Self::build(
            &config,
            profile,
            TransportSession::with_transport(session_config, transport),
        )
    }

    fn build(config: &AdapterConfig, profile: VendorProfile, session: TransportSession) -> Result<Self> {
        let default_index = match config.option("gpon_index") {
            Some(index) => index.parse()?,
            None => GponIndex::default(),
        };
        let onu_type = config.option("ont_type").map(str::to_string);
        if let Some(ref onu_type) = onu_type {
            check_cli_word("ont_type option", onu_type)?;
        }
        Ok(Self {
            session,
            parser: ZteParser::new(profile.clone()),
            profile,
            default_index,
            model: config.model.clone(),
            onu_type,
            gemport: config.parse_option("gemport")?.unwrap_or(1),
        })
    }

    /// The underlying CLI session.
    pub fn session(&mut self) -> &mut TransportSession {
        &mut self.session
    }

    fn resolve(&self, location: Option<&OntLocation>) -> Result<GponIndex> {
        match location {
            None => Ok(self.default_index),
            Some(OntLocation::GponIndex { index }) => index.parse(),
            Some(other) => Err(Error::configuration(format!(
                "ZTE OLTs address ONUs by gpon-olt shelf/slot/port index, got {}",
                other
            ))),
        }
    }

    async fn query(&mut self, command: &str) -> Result<String> {
        let output = self.session.send_command(command).await?;
        check_output(&self.parser, Operation::Command, command, &output)?;
        Ok(output)
    }

    async fn configure(&mut self, operation: Operation, commands: &[String]) -> Result<()> {
        let outputs = self
            .session
            .send_config_commands(commands, &self.profile.config_enter, &self.profile.config_exit)
            .await?;
        check_outputs(&self.parser, operation, commands, &outputs)
    }

    /// Wrap `commands` in the sub-mode entered by `enter`.
    fn within(&self, enter: String, commands: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut batch = vec![enter];
        batch.extend(commands);
        batch.push(self.profile.submode_exit.clone());
        batch
    }

    async fn manage_onu(
        &mut self,
        operation: Operation,
        index: &GponIndex,
        onu_id: u32,
        commands: Vec<String>,
    ) -> Result<()> {
        let batch = self.within(commands::onu_management(index, onu_id), commands);
        self.configure(operation, &batch).await
    }

    /// Run a command that asks `[yes/no]` inside ONU management, answering
    /// `yes`.
    async fn run_confirmed(&mut self, index: &GponIndex, onu_id: u32, command: &str) -> Result<()> {
        let mut entered = false;
        let result = self.confirm_in_management(index, onu_id, command, &mut entered).await;

        if entered && self.session.state() != SessionState::Disconnected {
            if let Err(e) = self.session.send_command(&self.profile.config_exit).await {
                debug!("Leaving config mode on {} failed: {}", self.session.host(), e);
            }
        }
        result
    }

    async fn confirm_in_management(
        &mut self,
        index: &GponIndex,
        onu_id: u32,
        command: &str,
        entered: &mut bool,
    ) -> Result<()> {
        for step in [self.profile.config_enter.clone(), commands::onu_management(index, onu_id)] {
            let output = self.session.send_command(&step).await?;
            *entered = true;
            check_output(&self.parser, Operation::Command, &step, &output)?;
        }

        let output = self
            .session
            .send_command_with(command, &CommandOptions::expecting(CONFIRM.clone()))
            .await?;
        check_output(&self.parser, Operation::Command, command, &output)?;

        if output.contains("[yes/no]") {
            let answer = self.session.send_command("yes").await?;
            check_output(&self.parser, Operation::Command, command, &answer)?;
        }
        Ok(())
    }
}

#[async_trait]
impl OltAdapter for ZteAdapter {
    fn vendor(&self) -> &str {
        &self.profile.name
    }

    fn host(&self) -> &str {
        self.session.host()
    }

    async fn connect(&mut self) -> bool {
        self.session.connect().await
    }

    async fn disconnect(&mut self) {
        self.session.disconnect().await
    }

    async fn is_connected(&mut self) -> bool {
        self.session.is_connected().await
    }

    async fn get_olt_info(&mut self) -> Result<OltInfo> {
        let output = self.query(&commands::show_system()).await?;
        let mut info = self.parser.parse_olt_info(&output)?;
        if info.hostname.is_none() {
            info.hostname = self.session.prompt().and_then(hostname_from_prompt);
        }
        if info.model.is_none() {
            info.model = self.model.clone();
        }
        Ok(info)
    }

    async fn get_ont_list(&mut self, port: Option<&OntLocation>) -> Result<Vec<OntRecord>> {
        let index = port.map(|location| self.resolve(Some(location))).transpose()?;
        let output = self.query(&commands::show_onu_list(index.as_ref())).await?;
        self.parser.parse_ont_list(&output)
    }

    async fn provision_ont(&mut self, request: &ProvisionRequest) -> Result<()> {
        request.validate()?;
        let index = self.resolve(request.ont.location.as_ref())?;
        let onu_id = request.ont.ont_id;
        let onu_type = request
            .ont_type
            .clone()
            .or_else(|| self.onu_type.clone())
            .ok_or_else(|| {
                Error::provisioning("ZTE provisioning needs an ONU type (request or `ont_type` option)")
            })?;
        let serial = commands::serial_vendor_form(&request.serial_number);
        let service = request.vlan.map(|vlan| ServiceVlan::new(vlan, self.gemport));

        let mut batch = self.within(
            commands::olt_interface(&index),
            [commands::onu_add(onu_id, &onu_type, &serial)],
        );

        let mut onu_settings = Vec::new();
        if let Some(ref description) = request.description {
            onu_settings.push(commands::description(description));
        }
        if let Some(ref service) = service {
            onu_settings.push(commands::service_port(1, service));
        }
        if !onu_settings.is_empty() {
            batch.extend(self.within(commands::onu_interface(&index, onu_id), onu_settings));
        }
        if let Some(ref service) = service {
            batch.extend(self.within(
                commands::onu_management(&index, onu_id),
                [commands::service("internet", service)],
            ));
        }

        self.configure(Operation::Provisioning, &batch).await?;
        info!(
            "Provisioned ONU {} ({}, {}) on {} gpon-olt_{}",
            onu_id,
            serial,
            onu_type,
            self.session.host(),
            index
        );
        Ok(())
    }

    async fn deprovision_ont(&mut self, ont: &OntRef) -> Result<()> {
        let index = self.resolve(ont.location.as_ref())?;
        let batch = self.within(
            commands::olt_interface(&index),
            [commands::onu_remove(ont.ont_id)],
        );
        self.configure(Operation::Provisioning, &batch).await?;
        info!("Deprovisioned {} on {}", ont, self.session.host());
        Ok(())
    }

    async fn configure_interface(&mut self, ont: &OntRef, config: &InterfaceConfig) -> Result<()> {
        config.validate()?;
        let index = self.resolve(ont.location.as_ref())?;
        let settings = commands::eth_port_settings(config);
        self.manage_onu(Operation::Configuration, &index, ont.ont_id, settings).await
    }

    async fn configure_vlan(&mut self, config: &VlanConfig) -> Result<()> {
        config.validate()?;
        let batch = commands::vlan(
            config.vlan_id,
            config.name.as_deref(),
            config.uplink_port.as_deref(),
        )?;
        self.configure(Operation::Configuration, &batch).await
    }

    async fn configure_ip(&mut self, ont: &OntRef, config: &IpConfig) -> Result<()> {
        config.validate()?;
        let index = self.resolve(ont.location.as_ref())?;
        let command = commands::wan_static(config);
        self.manage_onu(Operation::Configuration, &index, ont.ont_id, vec![command]).await
    }

    async fn configure_dhcp(&mut self, ont: &OntRef, config: &DhcpConfig) -> Result<()> {
        config.validate()?;
        let index = self.resolve(ont.location.as_ref())?;
        let command = commands::wan_dhcp(config);
        self.manage_onu(Operation::Configuration, &index, ont.ont_id, vec![command]).await
    }

    async fn configure_tr069(&mut self, ont: &OntRef, config: &Tr069Config) -> Result<()> {
        config.validate()?;
        let index = self.resolve(ont.location.as_ref())?;

        let batch = Zeroizing::new(self.within(
            commands::onu_management(&index, ont.ont_id),
            commands::tr069(config, config.password.as_ref().map(|p| p.expose_secret())),
        ));
        let labels: Vec<&str> = batch
            .iter()
            .map(|command| {
                if command.starts_with(TR069_ACS) {
                    TR069_ACS
                } else {
                    command.as_str()
                }
            })
            .collect();

        let outputs = self
            .session
            .send_config_commands_with(
                batch.as_slice(),
                &self.profile.config_enter,
                &self.profile.config_exit,
                &CommandOptions::new().redacted(),
            )
            .await?;
        check_outputs(&self.parser, Operation::Configuration, &labels, &outputs)
    }

    async fn configure_triple_play(&mut self, ont: &OntRef, config: &TriplePlayConfig) -> Result<()> {
        config.validate()?;
        let index = self.resolve(ont.location.as_ref())?;
        let services = config.services();

        let mut batch = self.within(
            commands::onu_interface(&index, ont.ont_id),
            services
                .iter()
                .enumerate()
                .map(|(i, (_, service))| commands::service_port(i + 1, service)),
        );
        batch.extend(self.within(
            commands::onu_management(&index, ont.ont_id),
            services
                .iter()
                .map(|(name, service)| commands::service(name, service)),
        ));
        self.configure(Operation::Configuration, &batch).await
    }

    async fn configure_routing_mode(&mut self, ont: &OntRef, mode: RoutingMode) -> Result<()> {
        let index = self.resolve(ont.location.as_ref())?;
        let command = commands::wan_mode(mode);
        self.manage_onu(Operation::Configuration, &index, ont.ont_id, vec![command]).await
    }

    async fn enable_port(&mut self, port: &OntLocation) -> Result<()> {
        let index = self.resolve(Some(port))?;
        let batch = self.within(commands::olt_interface(&index), [commands::port_admin(true)]);
        self.configure(Operation::Configuration, &batch).await
    }

    async fn disable_port(&mut self, port: &OntLocation) -> Result<()> {
        let index = self.resolve(Some(port))?;
        let batch = self.within(commands::olt_interface(&index), [commands::port_admin(false)]);
        self.configure(Operation::Configuration, &batch).await
    }

    async fn reboot_ont(&mut self, ont: &OntRef) -> Result<()> {
        let index = self.resolve(ont.location.as_ref())?;
        self.run_confirmed(&index, ont.ont_id, &commands::reboot()).await?;
        info!("Rebooted {} on {}", ont, self.session.host());
        Ok(())
    }

    async fn factory_reset_ont(&mut self, ont: &OntRef) -> Result<()> {
        let index = self.resolve(ont.location.as_ref())?;
        self.run_confirmed(&index, ont.ont_id, &commands::restore_factory()).await?;
        info!("Restored factory settings of {} on {}", ont, self.session.host());
        Ok(())
    }

    async fn get_ont_status(&mut self, ont: &OntRef) -> Result<OntRecord> {
        let index = self.resolve(ont.location.as_ref())?;
        let output = self.query(&commands::show_onu_detail(&index, ont.ont_id)).await?;
        self.parser.parse_ont_status(&output)
    }

    async fn get_ont_metrics(&mut self, ont: &OntRef) -> Result<OpticalMetrics> {
        let index = self.resolve(ont.location.as_ref())?;
        let command = commands::show_onu_optical(&index, ont.ont_id);

        let optical = self.session.send_command(&command).await?;
        if ZteParser::is_offline(&optical) {
            debug!("{} on {} is offline, no optical readings", ont, self.session.host());
            return Ok(OpticalMetrics::default());
        }
        check_output(&self.parser, Operation::Command, &command, &optical)?;

        let attenuation = self
            .query(&commands::show_attenuation(&index, ont.ont_id))
            .await?;
        self.parser
            .parse_optical_metrics(&format!("{}\n{}", optical, attenuation))
    }

    async fn get_ont_signal_history(&mut self, ont: &OntRef) -> Result<Vec<SignalSample>> {
        let index = self.resolve(ont.location.as_ref())?;
        let output = self.query(&commands::show_power_history(&index, ont.ont_id)).await?;
        self.parser.parse_signal_history(&output)
    }

    async fn get_ont_alerts(&mut self, ont: &OntRef) -> Result<Vec<AlertRecord>> {
        let index = self.resolve(ont.location.as_ref())?;
        let output = self.query(&commands::show_alarms(&index, ont.ont_id)).await?;
        self.parser.parse_alerts(&output)
    }

    async fn configure_alert_thresholds(&mut self, ont: &OntRef, thresholds: &AlertThresholds) -> Result<()> {
        thresholds.validate()?;
        let index = self.resolve(ont.location.as_ref())?;
        let command = commands::alarm_thresholds(thresholds);
        self.manage_onu(Operation::Configuration, &index, ont.ont_id, vec![command]).await
    }

    async fn get_ont_gps(&mut self, ont: &OntRef) -> Result<Option<GpsLocation>> {
        Ok(self.get_ont_status(ont).await?.gps)
    }

    async fn set_ont_gps(&mut self, ont: &OntRef, location: &GpsLocation) -> Result<()> {
        if !location.is_valid() {
            return Err(Error::configuration(format!(
                "coordinates {}, {} are out of range",
                location.latitude, location.longitude
            )));
        }
        let index = self.resolve(ont.location.as_ref())?;
        let command = commands::location(location);
        self.manage_onu(Operation::Configuration, &index, ont.ont_id, vec![command]).await
    }

    async fn configure_speed_limit(&mut self, ont: &OntRef, limit: &SpeedLimit) -> Result<()> {
        limit.validate()?;
        let index = self.resolve(ont.location.as_ref())?;
        let batch = self.within(
            commands::onu_interface(&index, ont.ont_id),
            [commands::traffic_limit(self.gemport, limit)],
        );
        self.configure(Operation::Configuration, &batch).await
    }

    async fn execute_custom_command(&mut self, command: &str) -> Result<String> {
        self.session.send_command(command).await
    }
}

impl std::fmt::Debug for ZteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZteAdapter")
            .field("session", &self.session)
            .field("default_index", &self.default_index)
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{MockHandle, MockTransport, test_config};

    const PROMPT: &str = "ZXAN#";

    fn adapter_with(config: AdapterConfig) -> (ZteAdapter, MockHandle) {
        let (transport, handle) = MockTransport::new(PROMPT);
        let session = TransportSession::with_transport(test_config(), Box::new(transport));
        let adapter = ZteAdapter::build(&config, super::super::profile(), session).unwrap();
        (adapter, handle)
    }

    fn adapter() -> (ZteAdapter, MockHandle) {
        adapter_with(AdapterConfig::new("192.0.2.20", "admin", SecretString::from("secret")))
    }

    fn at(onu_id: u32, index: &str) -> OntRef {
        OntRef::at(onu_id, OntLocation::gpon_index(index))
    }

    #[tokio::test]
    async fn test_empty_port_lists_nothing() {
        let (mut adapter, handle) = adapter();
        handle.respond("show gpon onu baseinfo", "No related information to show.");

        let onts = adapter
            .get_ont_list(Some(&OntLocation::gpon_index("1/2/1")))
            .await
            .unwrap();
        assert!(onts.is_empty());
        assert_eq!(handle.sent(), vec!["show gpon onu baseinfo gpon-olt_1/2/1"]);
    }

    #[tokio::test]
    async fn test_provision_requires_onu_type() {
        let (mut adapter, handle) = adapter();
        let request = ProvisionRequest::new(at(3, "1/1/1"), "ZTEGC0FFEE03");

        let err = adapter.provision_ont(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provisioning);
        assert!(handle.sent().is_empty());

        adapter
            .provision_ont(&request.with_ont_type("ZTE-F601"))
            .await
            .unwrap();
        assert_eq!(
            handle.sent(),
            vec![
                "configure terminal",
                "interface gpon-olt_1/1/1",
                "onu 3 type ZTE-F601 sn ZTEGC0FFEE03",
                "exit",
                "end",
            ]
        );
    }

    #[tokio::test]
    async fn test_provision_commands() {
        let config = AdapterConfig::new("192.0.2.20", "admin", SecretString::from("secret"))
            .with_option("ont_type", "ZTE-F660")
            .with_option("gpon_index", "1/2/1");
        let (mut adapter, handle) = adapter_with(config);

        let request = ProvisionRequest::new(OntRef::new(3), "5A544547C0FFEE03")
            .with_description("CUST-2003")
            .with_vlan(100);
        adapter.provision_ont(&request).await.unwrap();

        assert_eq!(
            handle.sent(),
            vec![
                "configure terminal",
                "interface gpon-olt_1/2/1",
                "onu 3 type ZTE-F660 sn ZTEGC0FFEE03",
                "exit",
                "interface gpon-onu_1/2/1:3",
                "description CUST-2003",
                "service-port 1 vport 1 user-vlan 100 vlan 100",
                "exit",
                "pon-onu-mng gpon-onu_1/2/1:3",
                "service internet gemport 1 vlan 100",
                "exit",
                "end",
            ]
        );
    }

    #[tokio::test]
    async fn test_frame_slot_location_is_rejected() {
        let (mut adapter, handle) = adapter();
        let ont = OntRef::at(3, OntLocation::frame_slot(0, 1, 0));

        let err = adapter.reboot_ont(&ont).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(handle.sent().is_empty());
    }

    #[tokio::test]
    async fn test_bad_default_index_is_rejected() {
        let config = AdapterConfig::new("192.0.2.20", "admin", SecretString::from("secret"))
            .with_option("gpon_index", "1-1-1");
        let err = ZteAdapter::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let config = AdapterConfig::new("192.0.2.20", "admin", SecretString::from("secret"))
            .with_option("ont_type", "ZTE-F601\nno onu 1");
        let err = ZteAdapter::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_missing_onu_is_not_found() {
        let (mut adapter, handle) = adapter();
        handle.respond("no onu 9", "%Code 32210-GPONSRV : The onu does not exist.");

        let err = adapter.deprovision_ont(&at(9, "1/1/1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(handle.sent().last().map(String::as_str), Some("end"));
    }

    #[tokio::test]
    async fn test_metrics_combine_both_views() {
        let (mut adapter, handle) = adapter();
        handle.respond(
            "show gpon remote-onu interface pon",
            "Rx optical level:     -20.111(dbm)\r\nTx optical level:     2.245(dbm)",
        );
        handle.respond(
            "show pon power attenuation",
            " up      Rx :-21.458(dbm)      Tx:2.245(dbm)        23.703(dB)",
        );

        let metrics = adapter.get_ont_metrics(&at(1, "1/1/1")).await.unwrap();
        assert_eq!(metrics.rx_power, Some(-20.111));
        assert_eq!(metrics.olt_rx_power, Some(-21.458));
        assert_eq!(
            handle.sent(),
            vec![
                "show gpon remote-onu interface pon gpon-onu_1/1/1:1",
                "show pon power attenuation gpon-onu_1/1/1:1",
            ]
        );
    }

    #[tokio::test]
    async fn test_offline_onu_skips_attenuation() {
        let (mut adapter, handle) = adapter();
        handle.respond(
            "show gpon remote-onu interface pon",
            "%Code 32310-GPONSRV : ONU is not online.",
        );

        let metrics = adapter.get_ont_metrics(&at(1, "1/1/1")).await.unwrap();
        assert!(metrics.is_empty());
        assert!(handle.sent_containing("attenuation").is_empty());
    }

    #[tokio::test]
    async fn test_reboot_answers_confirmation() {
        let (mut adapter, handle) = adapter();
        handle.respond_without_prompt("reboot", "Confirm to reboot?[yes/no]:");

        adapter.reboot_ont(&at(2, "1/1/1")).await.unwrap();
        assert_eq!(
            handle.sent(),
            vec!["configure terminal", "pon-onu-mng gpon-onu_1/1/1:2", "reboot", "yes", "end"]
        );
    }

    #[tokio::test]
    async fn test_tr069_error_names_redacted_command() {
        let (mut adapter, handle) = adapter();
        handle.respond(TR069_ACS, "%Error 20203: Invalid ACS URL");

        let config = Tr069Config::new("http://acs.example.net:7547")
            .with_credentials("cpe", SecretString::from("acs-pass-1"));
        let err = adapter.configure_tr069(&at(1, "1/1/1"), &config).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.to_string().contains("acs-pass-1"));
        assert!(err.to_string().contains(TR069_ACS));
        assert_eq!(handle.sent_containing("acs-pass-1").len(), 1);
    }

    #[tokio::test]
    async fn test_olt_info() {
        let (mut adapter, handle) = adapter();
        handle.respond(
            "show system-group",
            "System Name:         ZXAN-OLT-01\r\nSystem Description:  ZXA10 C320 Software Version: V2.1.0",
        );

        let info = adapter.get_olt_info().await.unwrap();
        assert_eq!(info.vendor, "zte");
        assert_eq!(info.hostname.as_deref(), Some("ZXAN-OLT-01"));
        assert_eq!(info.model.as_deref(), Some("C320"));
    }
}
