//! Fixed code tables translating the quote server's numeric codes.
//!
//! Each table is total: a code outside the known set maps to
//! `Unspecified(code)` and round-trips back to the same number.

use serde::{Deserialize, Serialize};

macro_rules! code_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// A code outside the known table, carried through unchanged.
            Unspecified(i32),
        }

        impl $name {
            /// Look up a remote numeric code.
            #[must_use]
            pub const fn from_code(code: i32) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    other => Self::Unspecified(other),
                }
            }

            /// The remote numeric code for this value.
            #[must_use]
            pub const fn code(self) -> i32 {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Unspecified(code) => code,
                }
            }

            /// Whether the code was found in the table.
            #[must_use]
            pub const fn is_known(self) -> bool {
                !matches!(self, Self::Unspecified(_))
            }
        }

        impl From<i32> for $name {
            fn from(code: i32) -> Self {
                Self::from_code(code)
            }
        }
    };
}

code_table! {
    /// Operation type of a trade.
    TradeType {
        /// Market buy.
        Buy = 0,
        /// Market sell.
        Sell = 1,
        /// Pending buy limit.
        BuyLimit = 2,
        /// Pending sell limit.
        SellLimit = 3,
        /// Pending buy stop.
        BuyStop = 4,
        /// Pending sell stop.
        SellStop = 5,
        /// Balance operation (deposit/withdrawal).
        Balance = 6,
        /// Credit operation.
        Credit = 7,
    }
}

code_table! {
    /// Lifecycle state of a trade on the server.
    TradeState {
        /// Open, normal.
        OpenNormal = 0,
        /// Open, remainder of a partial close.
        OpenRemand = 1,
        /// Open, restored from history.
        OpenRestored = 2,
        /// Closed, normal.
        ClosedNormal = 3,
        /// Closed partially.
        ClosedPart = 4,
        /// Closed by an opposite position.
        ClosedBy = 5,
        /// Deleted pending order.
        Deleted = 6,
    }
}

code_table! {
    /// Who or what placed the trade.
    PlacedReason {
        /// Desktop client.
        Client = 0,
        /// Expert advisor.
        Expert = 1,
        /// Dealer.
        Dealer = 2,
        /// Copied from a signal.
        Signal = 3,
        /// Gateway.
        Gateway = 4,
        /// Mobile client.
        Mobile = 5,
        /// Web terminal.
        Web = 6,
        /// Server API.
        Api = 7,
    }
}

impl TradeType {
    /// Market position (buy or sell) as opposed to a pending order or a
    /// balance operation.
    #[must_use]
    pub const fn is_market(self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }

    /// Pending order awaiting a trigger price.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::BuyLimit | Self::SellLimit | Self::BuyStop | Self::SellStop
        )
    }
}

impl TradeState {
    /// Whether this state describes a closed or deleted trade.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(
            self,
            Self::ClosedNormal | Self::ClosedPart | Self::ClosedBy | Self::Deleted
        )
    }
}
