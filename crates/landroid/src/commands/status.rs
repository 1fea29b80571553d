//! Status command: open the broker session, ping the mower, print the reply.

use landroid_core::{ClientConfig, LandroidClient, MowerStatus};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    config: ClientConfig,
    args: &StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = LandroidClient::connect_mqtt(config).await?;
    let result = client.mower_status().await;

    if let Err(e) = client.shutdown().await {
        tracing::warn!(error = %e, "disconnect failed");
    }
    let status = result?;

    let color = output::should_color(&global.color);
    let rendered = if args.battery {
        output::render_single(
            &global.output,
            &status.battery_percent(),
            |p| output::battery(*p, color),
            |p| p.map_or_else(String::new, |p| p.to_string()),
        )?
    } else {
        output::render_single(
            &global.output,
            &status,
            |s| detail(s, color),
            |s| s.battery_percent().map_or_else(String::new, |p| p.to_string()),
        )?
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn detail(status: &MowerStatus, color: bool) -> String {
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".into());
    let battery = status.dat.bt.as_ref();
    let stats = status.dat.st.as_ref();

    output::detail(&[
        (
            "Activity",
            or_dash(status.activity().map(|a| a.to_string())),
        ),
        ("Error", or_dash(status.error().map(|e| e.to_string()))),
        ("Battery", output::battery(status.battery_percent(), color)),
        (
            "Charging",
            output::flag(battery.and_then(|b| b.c).is_some_and(|c| c != 0), color),
        ),
        (
            "Temperature",
            or_dash(battery.and_then(|b| b.t).map(|t| format!("{t:.1} °C"))),
        ),
        ("Wi-Fi", or_dash(status.dat.rsi.map(|r| format!("{r} dBm")))),
        (
            "Firmware",
            or_dash(status.dat.fw.map(|fw| format!("{fw:.2}"))),
        ),
        (
            "Work time",
            or_dash(stats.and_then(|s| s.wt).map(|m| format!("{m} min"))),
        ),
        (
            "Distance",
            or_dash(stats.and_then(|s| s.d).map(|d| format!("{d} m"))),
        ),
        (
            "Reported",
            or_dash(status.reported_at().map(|t| t.to_string())),
        ),
    ])
}
