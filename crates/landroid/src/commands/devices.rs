//! Directory commands: registered devices and the signed-in account.

use tabled::Tabled;

use landroid_core::{ClientConfig, DeviceRecord, UserProfile};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
}

impl DeviceRow {
    fn new(d: &DeviceRecord, color: bool) -> Self {
        Self {
            name: d.display_name().to_owned(),
            serial: d.serial_number.clone().unwrap_or_default(),
            online: output::flag(d.online, color),
            firmware: d.firmware_version.clone().unwrap_or_default(),
            endpoint: d.mqtt_endpoint.clone(),
        }
    }
}

fn user_detail(user: &UserProfile) -> String {
    let or_dash = |v: Option<&String>| v.cloned().unwrap_or_else(|| "-".into());
    output::detail(&[
        ("ID", user.id.to_string()),
        ("Type", or_dash(user.user_type.as_ref())),
        ("Location", or_dash(user.location.as_ref())),
        ("Broker", or_dash(user.mqtt_endpoint.as_ref())),
        ("Created", or_dash(user.created_at.as_ref())),
    ])
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(config: ClientConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let client = crate::directory_client(config)?;
    let devices = client.fetch_devices().await?;

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &devices,
        |d| DeviceRow::new(d, color),
        |d| d.serial_number.clone().unwrap_or_else(|| d.id.to_string()),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn whoami(config: ClientConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let client = crate::directory_client(config)?;
    let user = client.fetch_user_profile().await?;

    let out = output::render_single(&global.output, &user, user_detail, |u| u.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
