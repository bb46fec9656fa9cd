//! The fixed set of record kinds exposed by the Atomx API.

use std::fmt;

macro_rules! model_kinds {
    ($($variant:ident => $resource:literal),+ $(,)?) => {
        /// A resource kind the API serves as typed records.
        ///
        /// Every kind is represented by the same generic [`Model`](crate::Model);
        /// the kind only decides which REST resource the record talks to.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ModelKind {
            $($variant),+
        }

        impl ModelKind {
            /// All known kinds.
            pub const ALL: &'static [ModelKind] = &[$(ModelKind::$variant),+];

            /// Canonical upper-camel name, e.g. `ConversionPixel`.
            pub fn name(self) -> &'static str {
                match self {
                    $(ModelKind::$variant => stringify!($variant)),+
                }
            }

            /// REST path segment for this kind, e.g. `conversion-pixel`.
            pub fn resource_name(self) -> &'static str {
                match self {
                    $(ModelKind::$variant => $resource),+
                }
            }
        }
    };
}

model_kinds! {
    AccountManager => "account-manager",
    Advertiser => "advertiser",
    Bidder => "bidder",
    Browser => "browser",
    Campaign => "campaign",
    Category => "category",
    ConnectionType => "connection-type",
    ConversionPixel => "conversion-pixel",
    Country => "country",
    Creative => "creative",
    CreativeAttribute => "creative-attribute",
    Datacenter => "datacenter",
    DeviceType => "device-type",
    Domain => "domain",
    Fallback => "fallback",
    Isp => "isp",
    Language => "language",
    Network => "network",
    OperatingSystem => "operating-system",
    Placement => "placement",
    PlacementType => "placement-type",
    Profile => "profile",
    Publisher => "publisher",
    Reason => "reason",
    Report => "report",
    Segment => "segment",
    SellerProfile => "seller-profile",
    Site => "site",
    Size => "size",
    Timezone => "timezone",
    User => "user",
    Visibility => "visibility",
}

impl ModelKind {
    /// Look up a kind by its exact canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
