/// A 64-bit J1939 NAME, the permanent identity of a controller application.
///
/// NAMEs double as arbitration tickets: when two devices claim the same
/// address, the one whose NAME has the *lower* numeric value keeps it. The
/// derived ordering on the raw value is exactly that contest order.
///
/// Bit layout, high to low:
///
/// | Field                     | Bits |
/// |---------------------------|------|
/// | Self-configurable address | 1    |
/// | Industry group            | 3    |
/// | Vehicle system instance   | 4    |
/// | Vehicle system            | 7    |
/// | Reserved                  | 1    |
/// | Function                  | 8    |
/// | Function instance         | 5    |
/// | ECU instance              | 3    |
/// | Manufacturer code         | 11   |
/// | Identity number           | 21   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Name(pub u64);

impl Name {
    #[allow(clippy::too_many_arguments)]
    pub fn from_fields(
        self_configurable_address: bool,
        industry_group: u8,
        vehicle_system_instance: u8,
        vehicle_system: u8,
        function: u8,
        function_instance: u8,
        ecu_instance: u8,
        manufacturer_code: u16,
        identity_number: u32,
    ) -> Self {
        let mut raw = 0u64;

        if self_configurable_address {
            raw |= 1 << 63;
        }
        raw |= (industry_group as u64 & 0x07) << 60;
        raw |= (vehicle_system_instance as u64 & 0x0f) << 56;
        raw |= (vehicle_system as u64 & 0x7f) << 49;
        // bit 48 is reserved
        raw |= (function as u64) << 40;
        raw |= (function_instance as u64 & 0x1f) << 35;
        raw |= (ecu_instance as u64 & 0x07) << 32;
        raw |= (manufacturer_code as u64 & 0x7ff) << 21;
        raw |= identity_number as u64 & 0x1fffff;

        Name(raw)
    }

    /// Whether the device can pick a new address on its own when it loses
    /// arbitration.
    pub const fn self_configurable_address(self) -> bool {
        self.0 >> 63 != 0
    }

    pub const fn industry_group(self) -> u8 {
        (self.0 >> 60) as u8 & 0x07
    }

    pub const fn vehicle_system_instance(self) -> u8 {
        (self.0 >> 56) as u8 & 0x0f
    }

    pub const fn vehicle_system(self) -> u8 {
        (self.0 >> 49) as u8 & 0x7f
    }

    pub const fn function(self) -> u8 {
        (self.0 >> 40) as u8
    }

    pub const fn function_instance(self) -> u8 {
        (self.0 >> 35) as u8 & 0x1f
    }

    pub const fn ecu_instance(self) -> u8 {
        (self.0 >> 32) as u8 & 0x07
    }

    pub const fn manufacturer_code(self) -> u16 {
        (self.0 >> 21) as u16 & 0x7ff
    }

    pub const fn identity_number(self) -> u32 {
        self.0 as u32 & 0x1fffff
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// True when this NAME beats `other` in an address contest.
    pub const fn has_priority_over(self, other: Name) -> bool {
        self.0 < other.0
    }

    /// The 8-byte wire form used in address-claim payloads.
    pub const fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Name(u64::from_le_bytes(bytes))
    }
}

impl From<u64> for Name {
    fn from(raw: u64) -> Self {
        Name(raw)
    }
}

impl From<Name> for u64 {
    fn from(name: Name) -> Self {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::Name;

    #[test]
    fn field_round_trip() {
        struct TestCase {
            self_configurable_address: bool,
            industry_group: u8,
            vehicle_system_instance: u8,
            vehicle_system: u8,
            function: u8,
            function_instance: u8,
            ecu_instance: u8,
            manufacturer_code: u16,
            identity_number: u32,
        }
        let test_cases = [
            TestCase {
                self_configurable_address: true,
                industry_group: 0x02,
                vehicle_system_instance: 0x05,
                vehicle_system: 0x55,
                function: 0x55,
                function_instance: 0x15,
                ecu_instance: 0x05,
                manufacturer_code: 0x0555,
                identity_number: 0x00155555,
            },
            TestCase {
                self_configurable_address: false,
                industry_group: 0x05,
                vehicle_system_instance: 0x0a,
                vehicle_system: 0x2a,
                function: 0xaa,
                function_instance: 0x0a,
                ecu_instance: 0x02,
                manufacturer_code: 0x02aa,
                identity_number: 0x000aaaaa,
            },
        ];
        for case in &test_cases {
            let name = Name::from_fields(
                case.self_configurable_address,
                case.industry_group,
                case.vehicle_system_instance,
                case.vehicle_system,
                case.function,
                case.function_instance,
                case.ecu_instance,
                case.manufacturer_code,
                case.identity_number,
            );

            assert_eq!(
                case.self_configurable_address,
                name.self_configurable_address()
            );
            assert_eq!(case.industry_group, name.industry_group());
            assert_eq!(case.vehicle_system_instance, name.vehicle_system_instance());
            assert_eq!(case.vehicle_system, name.vehicle_system());
            assert_eq!(case.function, name.function());
            assert_eq!(case.function_instance, name.function_instance());
            assert_eq!(case.ecu_instance, name.ecu_instance());
            assert_eq!(case.manufacturer_code, name.manufacturer_code());
            assert_eq!(case.identity_number, name.identity_number());
        }
    }

    #[test]
    fn lower_value_wins() {
        let a = Name(0x0001);
        let b = Name(0x5000);
        assert!(a.has_priority_over(b));
        assert!(!b.has_priority_over(a));
        assert!(!a.has_priority_over(a));
        assert!(a < b);
    }

    #[test]
    fn wire_codec() {
        let name = Name(0xa00c_8104_5a20_021b);
        assert_eq!(Name::from_le_bytes(name.to_le_bytes()), name);
        assert_eq!(name.to_le_bytes()[0], 0x1b);
    }
}
