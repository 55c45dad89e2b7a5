//! Sample object table of a small solar charge controller.
//!
//! Used by the `devobj` binary and handy for trying out clients. The
//! measurements are simulated from the time since start.

use crate::device::ObjectTable;
use devobj_core::{Access, DataObject, Registry, RegistryError, Value};
use std::cell::{Cell, RefCell};
use std::time::Instant;

/// Category names; index `i` is category `i + 1`.
pub const CATEGORIES: [&str; 5] = ["info", "conf", "input", "output", "rpc"];

/// Objects published when no explicit id list is configured.
pub const DEFAULT_PUBLICATION: [u16; 5] = [0x3001, 0x3002, 0x4001, 0x4002, 0x4003];

const NICKNAME_LEN: usize = 16;
const AUTH_TOKEN_LEN: usize = 16;

pub struct DemoDevice {
    started: Instant,

    manufacturer: RefCell<String>,
    device_type: RefCell<String>,
    firmware_version: RefCell<String>,
    device_id: Cell<u32>,

    bat_charge_v: Cell<f32>,
    load_disconnect_v: Cell<f32>,
    load_enabled: Cell<bool>,
    bat_nominal_ah: Cell<f32>,
    bat_offset_mv: Cell<i32>,
    timestamp_s: Cell<i64>,
    nickname: RefCell<String>,

    solar_v: Cell<f32>,
    bat_v: Cell<f32>,
    bat_temp_degc: Cell<i16>,

    load_a: Cell<f32>,
    charge_state: Cell<u16>,
    uptime_s: Cell<u32>,
    solar_energy_wh: Cell<u64>,
    energy_origin_s: Cell<u64>,

    auth_token: RefCell<String>,
}

impl DemoDevice {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            manufacturer: RefCell::new("Libre Solar".to_string()),
            device_type: RefCell::new("MPPT 2420 HC".to_string()),
            firmware_version: RefCell::new(env!("CARGO_PKG_VERSION").to_string()),
            device_id: Cell::new(0x00C0_FFEE),
            bat_charge_v: Cell::new(14.4),
            load_disconnect_v: Cell::new(11.8),
            load_enabled: Cell::new(true),
            bat_nominal_ah: Cell::new(100.0),
            bat_offset_mv: Cell::new(0),
            timestamp_s: Cell::new(0),
            nickname: RefCell::new(String::with_capacity(NICKNAME_LEN)),
            solar_v: Cell::new(0.0),
            bat_v: Cell::new(0.0),
            bat_temp_degc: Cell::new(25),
            load_a: Cell::new(0.0),
            charge_state: Cell::new(0),
            uptime_s: Cell::new(0),
            solar_energy_wh: Cell::new(0),
            energy_origin_s: Cell::new(0),
            auth_token: RefCell::new(String::with_capacity(AUTH_TOKEN_LEN)),
        }
    }

    /// Clears the energy counter.
    fn reset_counters(&self) {
        self.energy_origin_s.set(u64::from(self.uptime_s.get()));
        self.solar_energy_wh.set(0);
        tracing::info!("Energy counters reset");
    }
}

impl Default for DemoDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectTable for DemoDevice {
    fn with_registry(&self, run: &mut dyn FnMut(Registry<'_>)) -> Result<(), RegistryError> {
        let reset = || self.reset_counters();

        let registry = Registry::new(vec![
            // info
            DataObject::new(
                0x1001,
                "Manufacturer",
                Access::READ,
                Value::string(&self.manufacturer, 16),
            ),
            DataObject::new(
                0x1002,
                "DeviceType",
                Access::READ,
                Value::string(&self.device_type, 16),
            ),
            DataObject::new(
                0x1003,
                "FirmwareVersion",
                Access::READ,
                Value::string(&self.firmware_version, 16),
            ),
            DataObject::new(0x1004, "DeviceID", Access::READ, Value::U32(&self.device_id)),
            // conf
            DataObject::new(
                0x2001,
                "BatCharge_V",
                Access::READ_WRITE,
                Value::float(&self.bat_charge_v, 2),
            ),
            DataObject::new(
                0x2002,
                "LoadDisconnect_V",
                Access::READ_WRITE,
                Value::float(&self.load_disconnect_v, 2),
            ),
            DataObject::new(
                0x2003,
                "LoadEnabled",
                Access::READ_WRITE,
                Value::Bool(&self.load_enabled),
            ),
            DataObject::new(
                0x2004,
                "BatNom_Ah",
                Access::READ_WRITE,
                Value::float(&self.bat_nominal_ah, 1),
            ),
            DataObject::new(
                0x2005,
                "BatOffset_mV",
                Access::READ_WRITE,
                Value::I32(&self.bat_offset_mv),
            ),
            DataObject::new(
                0x2006,
                "Timestamp_s",
                Access::READ_WRITE,
                Value::I64(&self.timestamp_s),
            ),
            DataObject::new(
                0x2007,
                "Nickname",
                Access::READ_WRITE,
                Value::string(&self.nickname, NICKNAME_LEN),
            ),
            // input
            DataObject::new(0x3001, "Solar_V", Access::READ, Value::float(&self.solar_v, 2)),
            DataObject::new(0x3002, "Bat_V", Access::READ, Value::float(&self.bat_v, 2)),
            DataObject::new(0x3003, "BatTemp_degC", Access::READ, Value::I16(&self.bat_temp_degc)),
            // output
            DataObject::new(0x4001, "Load_A", Access::READ, Value::float(&self.load_a, 2)),
            DataObject::new(0x4002, "ChgState", Access::READ, Value::U16(&self.charge_state)),
            DataObject::new(0x4003, "Uptime_s", Access::READ, Value::U32(&self.uptime_s)),
            DataObject::new(
                0x4004,
                "SolarInTotal_Wh",
                Access::READ,
                Value::U64(&self.solar_energy_wh),
            ),
            // rpc
            DataObject::new(0x5001, "reset", Access::EXEC, Value::Exec(&reset)),
            DataObject::new(
                0x5002,
                "AuthToken",
                Access::WRITE,
                Value::string(&self.auth_token, AUTH_TOKEN_LEN),
            ),
        ])?
        .with_categories(&CATEGORIES)?;

        run(registry);
        Ok(())
    }

    fn update(&self) {
        let elapsed = self.started.elapsed().as_secs_f32();
        let uptime = elapsed as u32;
        self.uptime_s.set(uptime);

        let solar_v = 18.0 + 2.0 * (elapsed / 60.0).sin();
        let bat_v = 12.8 + 0.4 * (elapsed / 300.0).sin() + self.bat_offset_mv.get() as f32 / 1000.0;
        self.solar_v.set(solar_v);
        self.bat_v.set(bat_v);
        self.charge_state.set(u16::from(solar_v > bat_v + 0.5));

        let load_on = self.load_enabled.get() && bat_v > self.load_disconnect_v.get();
        self.load_a.set(if load_on { 1.5 } else { 0.0 });

        // Roughly 36 W of charging power.
        let charging_s = u64::from(uptime).saturating_sub(self.energy_origin_s.get());
        self.solar_energy_wh.set(charging_s / 100);
    }
}
