//! [`OltAdapter`] for Huawei SmartAX OLTs.

use std::sync::LazyLock;

use async_trait::async_trait;
use log::{debug, info};
use secrecy::ExposeSecret;
use zeroize::Zeroizing;

use super::commands::{self, PonPort};
use super::parser::HuaweiParser;
use crate::adapter::{
    AdapterConfig, AlertThresholds, DhcpConfig, InterfaceConfig, IpConfig, OltAdapter, OntRef,
    Operation, ProvisionRequest, RoutingMode, ServiceVlan, SpeedLimit, Tr069Config,
    TriplePlayConfig, VlanConfig, check_output, check_outputs,
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

/// Either the `(y/n)` question destructive ONT commands ask, or the prompt
/// when the device skips it.
static CONFIRM: LazyLock<Expect> = LazyLock::new(|| {
    Expect::pattern(r"\(y/n\)|[#>]\s*$").expect("valid confirmation pattern")
});

/// Label used in place of the TR-069 profile command, which carries the ACS
/// password.
const TR069_PROFILE: &str = "ont tr069-server-profile add";

/// Huawei MA5600T/MA5800 adapter.
///
/// Vendor options read from [`AdapterConfig::options`]:
/// `frame`/`slot`/`port` (PON port used when an [`OntRef`] carries no
/// location, default `0/0/0`), `line_profile`/`service_profile` (ONT
/// profiles for provisioning, default 1) and `gemport` (default 1).
pub struct HuaweiAdapter {
    session: TransportSession,
    parser: HuaweiParser,
    profile: VendorProfile,
    default_port: PonPort,
    model: Option<String>,
    line_profile: u32,
    service_profile: u32,
    gemport: u16,
}

impl HuaweiAdapter {
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
        let default_port = PonPort::new(
            config.parse_option("frame")?.unwrap_or(0),
            config.parse_option("slot")?.unwrap_or(0),
            config.parse_option("port")?.unwrap_or(0),
        );
        Ok(Self {
            session,
            parser: HuaweiParser::new(profile.clone()),
            profile,
            default_port,
            model: config.model.clone(),
            line_profile: config.parse_option("line_profile")?.unwrap_or(1),
            service_profile: config.parse_option("service_profile")?.unwrap_or(1),
            gemport: config.parse_option("gemport")?.unwrap_or(1),
        })
    }

    /// The underlying CLI session.
    pub fn session(&mut self) -> &mut TransportSession {
        &mut self.session
    }

    fn resolve(&self, location: Option<&OntLocation>) -> Result<PonPort> {
        match location {
            None => Ok(self.default_port),
            Some(OntLocation::FrameSlot { frame, slot, port }) => Ok(PonPort::new(*frame, *slot, *port)),
            Some(other) => Err(Error::configuration(format!(
                "Huawei OLTs address ONTs by frame/slot/port, got {}",
                other
            ))),
        }
    }

    async fn query(&mut self, command: &str) -> Result<String> {
        let output = self.session.send_command(command).await?;
        check_output(&self.parser, Operation::Command, command, &output)?;
        Ok(output)
    }

    /// Run `commands` in global config mode and check every output.
    async fn configure(&mut self, operation: Operation, commands: &[String]) -> Result<Vec<String>> {
        let outputs = self
            .session
            .send_config_commands(commands, &self.profile.config_enter, &self.profile.config_exit)
            .await?;
        check_outputs(&self.parser, operation, commands, &outputs)?;
        Ok(outputs)
    }

    /// Run ONT-level `commands` inside the board interface of `port`.
    async fn configure_board(
        &mut self,
        operation: Operation,
        port: &PonPort,
        commands: Vec<String>,
    ) -> Result<()> {
        let mut batch = Vec::with_capacity(commands.len() + 2);
        batch.push(commands::interface(port));
        batch.extend(commands);
        batch.push(self.profile.submode_exit.clone());
        self.configure(operation, &batch).await.map(|_| ())
    }

    /// Run a command that may ask for confirmation inside the board
    /// interface of `port`, answering `y`.
    async fn run_confirmed(&mut self, port: &PonPort, command: &str) -> Result<()> {
        let mut depth = 0;
        let result = self.confirm_in_board(port, command, &mut depth).await;

        for _ in 0..depth {
            if self.session.state() == SessionState::Disconnected {
                break;
            }
            if let Err(e) = self.session.send_command(&self.profile.submode_exit).await {
                debug!("Leaving config mode on {} failed: {}", self.session.host(), e);
                break;
            }
        }
        result
    }

    async fn confirm_in_board(&mut self, port: &PonPort, command: &str, depth: &mut usize) -> Result<()> {
        for step in [self.profile.config_enter.clone(), commands::interface(port)] {
            let output = self.session.send_command(&step).await?;
            *depth += 1;
            check_output(&self.parser, Operation::Command, &step, &output)?;
        }

        let output = self
            .session
            .send_command_with(command, &CommandOptions::expecting(CONFIRM.clone()))
            .await?;
        check_output(&self.parser, Operation::Command, command, &output)?;

        if output.contains("(y/n)") {
            let answer = self.session.send_command("y").await?;
            check_output(&self.parser, Operation::Command, command, &answer)?;
        }
        Ok(())
    }
}

#[async_trait]
impl OltAdapter for HuaweiAdapter {
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
        let output = self.query(&commands::display_version()).await?;
        let mut info = self.parser.parse_olt_info(&output)?;
        info.hostname = self.session.prompt().and_then(hostname_from_prompt);
        if info.model.is_none() {
            info.model = self.model.clone();
        }
        Ok(info)
    }

    async fn get_ont_list(&mut self, port: Option<&OntLocation>) -> Result<Vec<OntRecord>> {
        let port = port.map(|location| self.resolve(Some(location))).transpose()?;
        let command = commands::display_ont_list(port.as_ref());

        let output = self.session.send_command(&command).await?;
        if HuaweiParser::is_empty_listing(&output) {
            return Ok(Vec::new());
        }
        check_output(&self.parser, Operation::Command, &command, &output)?;
        self.parser.parse_ont_list(&output)
    }

    async fn provision_ont(&mut self, request: &ProvisionRequest) -> Result<()> {
        request.validate()?;
        let port = self.resolve(request.ont.location.as_ref())?;
        let ont_id = request.ont.ont_id;
        let serial = commands::serial_hex(&request.serial_number);

        let mut batch = vec![
            commands::interface(&port),
            commands::ont_add(
                &port,
                ont_id,
                &serial,
                request.line_profile.unwrap_or(self.line_profile),
                request.service_profile.unwrap_or(self.service_profile),
                request.description.as_deref(),
            ),
            self.profile.submode_exit.clone(),
        ];
        if let Some(vlan) = request.vlan {
            batch.push(commands::service_port(
                &port,
                ont_id,
                &ServiceVlan::new(vlan, self.gemport),
            ));
        }

        self.configure(Operation::Provisioning, &batch).await?;
        info!(
            "Provisioned ONT {} ({}) on {} port {}",
            ont_id,
            serial,
            self.session.host(),
            port
        );
        Ok(())
    }

    async fn deprovision_ont(&mut self, ont: &OntRef) -> Result<()> {
        let port = self.resolve(ont.location.as_ref())?;
        let batch = vec![
            commands::undo_service_ports(&port, ont.ont_id),
            commands::interface(&port),
            commands::ont_delete(&port, ont.ont_id),
            self.profile.submode_exit.clone(),
        ];

        let outputs = self
            .session
            .send_config_commands(&batch, &self.profile.config_enter, &self.profile.config_exit)
            .await?;
        // an ONT without service ports is not an error
        check_outputs(&self.parser, Operation::Provisioning, &batch[1..3], &outputs[1..3])?;

        info!("Deprovisioned {} on {}", ont, self.session.host());
        Ok(())
    }

    async fn configure_interface(&mut self, ont: &OntRef, config: &InterfaceConfig) -> Result<()> {
        config.validate()?;
        let port = self.resolve(ont.location.as_ref())?;
        let settings = commands::ont_port_settings(&port, ont.ont_id, config);
        self.configure_board(Operation::Configuration, &port, settings).await
    }

    async fn configure_vlan(&mut self, config: &VlanConfig) -> Result<()> {
        config.validate()?;
        let batch = commands::vlan(
            config.vlan_id,
            config.name.as_deref(),
            config.uplink_port.as_deref(),
        )?;
        self.configure(Operation::Configuration, &batch).await?;
        Ok(())
    }

    async fn configure_ip(&mut self, ont: &OntRef, config: &IpConfig) -> Result<()> {
        config.validate()?;
        let port = self.resolve(ont.location.as_ref())?;
        let command = commands::ip_static(&port, ont.ont_id, config);
        self.configure_board(Operation::Configuration, &port, vec![command]).await
    }

    async fn configure_dhcp(&mut self, ont: &OntRef, config: &DhcpConfig) -> Result<()> {
        config.validate()?;
        let port = self.resolve(ont.location.as_ref())?;
        let command = commands::ip_dhcp(&port, ont.ont_id, config);
        self.configure_board(Operation::Configuration, &port, vec![command]).await
    }

    async fn configure_tr069(&mut self, ont: &OntRef, config: &Tr069Config) -> Result<()> {
        config.validate()?;
        let port = self.resolve(ont.location.as_ref())?;

        let profile_command = Zeroizing::new(commands::tr069_profile(
            config,
            config.password.as_ref().map(|p| p.expose_secret()),
        ));
        let outputs = self
            .session
            .send_config_commands_with(
                &[profile_command.as_str()],
                &self.profile.config_enter,
                &self.profile.config_exit,
                &CommandOptions::new().redacted(),
            )
            .await?;
        for output in &outputs {
            check_output(&self.parser, Operation::Configuration, TR069_PROFILE, output)?;
        }

        let bind = commands::tr069_bind(&port, ont.ont_id, config.profile_id);
        self.configure_board(Operation::Configuration, &port, vec![bind]).await
    }

    async fn configure_triple_play(&mut self, ont: &OntRef, config: &TriplePlayConfig) -> Result<()> {
        config.validate()?;
        let port = self.resolve(ont.location.as_ref())?;
        let batch: Vec<String> = config
            .services()
            .iter()
            .map(|(_, service)| commands::service_port(&port, ont.ont_id, service))
            .collect();
        self.configure(Operation::Configuration, &batch).await?;
        Ok(())
    }

    async fn configure_routing_mode(&mut self, ont: &OntRef, mode: RoutingMode) -> Result<()> {
        let port = self.resolve(ont.location.as_ref())?;
        let command = commands::routing_mode(&port, ont.ont_id, mode);
        self.configure_board(Operation::Configuration, &port, vec![command]).await
    }

    async fn enable_port(&mut self, port: &OntLocation) -> Result<()> {
        let port = self.resolve(Some(port))?;
        let command = commands::port_admin(&port, true);
        self.configure_board(Operation::Configuration, &port, vec![command]).await
    }

    async fn disable_port(&mut self, port: &OntLocation) -> Result<()> {
        let port = self.resolve(Some(port))?;
        let command = commands::port_admin(&port, false);
        self.configure_board(Operation::Configuration, &port, vec![command]).await
    }

    async fn reboot_ont(&mut self, ont: &OntRef) -> Result<()> {
        let port = self.resolve(ont.location.as_ref())?;
        self.run_confirmed(&port, &commands::ont_reset(&port, ont.ont_id)).await?;
        info!("Rebooted {} on {}", ont, self.session.host());
        Ok(())
    }

    async fn factory_reset_ont(&mut self, ont: &OntRef) -> Result<()> {
        let port = self.resolve(ont.location.as_ref())?;
        self.run_confirmed(&port, &commands::ont_factory_reset(&port, ont.ont_id)).await?;
        info!("Restored factory settings of {} on {}", ont, self.session.host());
        Ok(())
    }

    async fn get_ont_status(&mut self, ont: &OntRef) -> Result<OntRecord> {
        let port = self.resolve(ont.location.as_ref())?;
        let output = self.query(&commands::display_ont(&port, ont.ont_id)).await?;
        self.parser.parse_ont_status(&output)
    }

    async fn get_ont_metrics(&mut self, ont: &OntRef) -> Result<OpticalMetrics> {
        let port = self.resolve(ont.location.as_ref())?;
        let command = commands::display_optical(&port, ont.ont_id);
        let batch = [
            commands::interface(&port),
            command.clone(),
            self.profile.submode_exit.clone(),
        ];

        let outputs = self
            .session
            .send_config_commands(&batch, &self.profile.config_enter, &self.profile.config_exit)
            .await?;
        check_output(&self.parser, Operation::Command, &batch[0], &outputs[0])?;

        let output = &outputs[1];
        if HuaweiParser::is_offline(output) {
            debug!("{} on {} is offline, no optical readings", ont, self.session.host());
            return Ok(OpticalMetrics::default());
        }
        check_output(&self.parser, Operation::Command, &command, output)?;
        self.parser.parse_optical_metrics(output)
    }

    async fn get_ont_signal_history(&mut self, ont: &OntRef) -> Result<Vec<SignalSample>> {
        let port = self.resolve(ont.location.as_ref())?;
        let output = self
            .query(&commands::display_optical_history(&port, ont.ont_id))
            .await?;
        self.parser.parse_signal_history(&output)
    }

    async fn get_ont_alerts(&mut self, ont: &OntRef) -> Result<Vec<AlertRecord>> {
        let port = self.resolve(ont.location.as_ref())?;
        let output = self.query(&commands::display_alarms(&port, ont.ont_id)).await?;
        self.parser.parse_alerts(&output)
    }

    async fn configure_alert_thresholds(&mut self, ont: &OntRef, thresholds: &AlertThresholds) -> Result<()> {
        thresholds.validate()?;
        let port = self.resolve(ont.location.as_ref())?;
        let command = commands::alarm_thresholds(&port, ont.ont_id, thresholds);
        self.configure_board(Operation::Configuration, &port, vec![command]).await
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
        let port = self.resolve(ont.location.as_ref())?;
        let command = commands::gps(&port, ont.ont_id, location);
        self.configure_board(Operation::Configuration, &port, vec![command]).await
    }

    async fn configure_speed_limit(&mut self, ont: &OntRef, limit: &SpeedLimit) -> Result<()> {
        limit.validate()?;
        let port = self.resolve(ont.location.as_ref())?;
        let command = commands::speed_limit(&port, ont.ont_id, limit);
        self.configure_board(Operation::Configuration, &port, vec![command]).await
    }

    async fn execute_custom_command(&mut self, command: &str) -> Result<String> {
        self.session.send_command(command).await
    }
}

impl std::fmt::Debug for HuaweiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuaweiAdapter")
            .field("session", &self.session)
            .field("default_port", &self.default_port)
            .field("model", &self.model)
            .finish()
    }
}
