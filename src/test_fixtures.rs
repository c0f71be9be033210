//! Synthetic EV specification data for tests.

use crate::preprocessing::schema::RawRecord;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub(crate) const HEADER: &str = "top_speed_kmh,battery_capacity_kWh,torque_nm,acceleration_0_100_s,fast_charging_power_kw_dc,fast_charge_port,seats,drivetrain,length_mm,width_mm,height_mm,range_km";

const PORTS: [&str; 3] = ["CCS", "CHAdeMO", "Type 2"];
const DRIVETRAINS: [&str; 3] = ["AWD", "FWD", "RWD"];

struct Spec {
    top_speed: f64,
    battery: f64,
    torque: f64,
    accel: f64,
    charging: f64,
    port: &'static str,
    seats: f64,
    drivetrain: &'static str,
    length: f64,
    width: f64,
    height: f64,
    range: f64,
}

fn spec(rng: &mut ChaCha8Rng) -> Spec {
    let battery: f64 = rng.gen_range(40.0..110.0);
    let torque: f64 = rng.gen_range(200.0..800.0);
    let seats = *[4.0, 5.0, 5.0, 7.0].choose(rng).unwrap_or(&5.0);
    let top_speed = rng.gen_range(130.0..260.0);
    let noise: f64 = rng.gen_range(-15.0..15.0);
    Spec {
        top_speed,
        battery,
        torque,
        accel: (11.0 - torque / 100.0 + rng.gen_range(-0.5..0.5)).max(2.5),
        charging: rng.gen_range(50.0..250.0),
        port: PORTS.choose(rng).copied().unwrap_or("CCS"),
        seats,
        drivetrain: DRIVETRAINS.choose(rng).copied().unwrap_or("AWD"),
        length: rng.gen_range(4000.0..5100.0),
        width: rng.gen_range(1750.0..2000.0),
        height: rng.gen_range(1400.0..1750.0),
        range: (battery * 6.0 + (top_speed - 150.0) * 0.3 - (seats - 5.0) * 10.0 + noise)
            .max(100.0),
    }
}

fn csv_line(s: &Spec) -> String {
    format!(
        "{:.0},{:.1},{:.0},{:.1},{:.0},{},{:.0},{},{:.0},{:.0},{:.0},{:.0}",
        s.top_speed,
        s.battery,
        s.torque,
        s.accel,
        s.charging,
        s.port,
        s.seats,
        s.drivetrain,
        s.length,
        s.width,
        s.height,
        s.range
    )
}

/// CSV text with a header and `rows` valid data rows.
pub(crate) fn ev_csv(rows: usize, seed: u64) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut text = String::from(HEADER);
    for _ in 0..rows {
        text.push('\n');
        text.push_str(&csv_line(&spec(&mut rng)));
    }
    text.push('\n');
    text
}

/// One valid record including the target, deterministic in `i`.
pub(crate) fn ev_record(i: u64) -> RawRecord {
    let s = spec(&mut ChaCha8Rng::seed_from_u64(10_000 + i));
    RawRecord::new()
        .with("top_speed_kmh", s.top_speed.round())
        .with("battery_capacity_kWh", s.battery)
        .with("torque_nm", s.torque.round())
        .with("acceleration_0_100_s", s.accel)
        .with("fast_charging_power_kw_dc", s.charging.round())
        .with("fast_charge_port", s.port)
        .with("seats", s.seats)
        .with("drivetrain", s.drivetrain)
        .with("length_mm", s.length.round())
        .with("width_mm", s.width.round())
        .with("height_mm", s.height.round())
        .with("range_km", s.range.round())
}
