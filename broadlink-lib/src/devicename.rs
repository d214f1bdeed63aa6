// Known Broadlink device models by type code

use crate::device::Device;

/// Model name and product class of a device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceModel {
    pub name: &'static str,
    pub class: &'static str,
}

const fn model(name: &'static str, class: &'static str) -> Option<DeviceModel> {
    Some(DeviceModel { name, class })
}

/// Look up a device type code in the table of known models.
pub fn lookup(device_type: u16) -> Option<DeviceModel> {
    match device_type {
        0x0000 => model("SP1", "SP1"),
        0x2711 => model("SP2", "SP2"),
        0x2712 => model("RM2", "RM"),
        0x2714 => model("A1", "A1"),
        0x2719 | 0x271a => model("Honeywell SP2", "SP2"),
        0x2720 => model("SPMini", "SP2"),
        0x2722 => model("SmartOne Alarm Kit", "S1C"),
        0x2728 => model("SPMini2", "SP2"),
        0x272a => model("RM2 Pro Plus", "RM"),
        0x2733 | 0x273e => model("OEM branded SPMini", "SP2"),
        0x2736 => model("SPMiniPlus", "SP2"),
        0x2737 => model("RM Mini / RM3 Mini Blackbean", "RM"),
        0x273d => model("RM Pro Phicomm", "RM"),
        0x277c => model("RM2 Home Plus GDT", "RM"),
        0x2783 => model("RM2 Home Plus", "RM"),
        0x2787 => model("RM2 Pro Plus2", "RM"),
        0x278b => model("RM2 Pro Plus BL", "RM"),
        0x278f => model("RM Mini Shate", "RM"),
        0x2797 => model("RM2 Pro Plus HYC", "RM"),
        0x279d => model("RM2 Pro Plus3", "RM"),
        0x27a1 => model("RM2 Pro Plus R1", "RM"),
        0x27a6 => model("RM2 Pro PP", "RM"),
        0x27a9 => model("RM2 Pro Plus_300", "RM"),
        0x4e4d => model("Dooya DT360E", "Dooya"),
        0x4ead => model("Hysen controller", "HYSEN"),
        0x4eb5 => model("MP1", "MP1"),
        0x4ef7 => model("Honyar OEM MP1", "MP1"),
        0x753e => model("SP3", "SP2"),
        0x7919 | 0x791a => model("Honeywell SP2", "SP2"),
        0x7d00 => model("OEM branded SP3", "SP2"),
        0x9479 | 0x947a => model("SP3S", "SP2"),
        0x7530..=0x7918 => model("OEM branded SPMini2", "SP2"),
        _ => None,
    }
}

impl Device {
    /// Model of this device, if its type code is known.
    pub fn model(&self) -> Option<DeviceModel> {
        lookup(self.device_type)
    }
}
