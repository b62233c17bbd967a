//! Declarative helpers shared by the model layer.

/// Declare a closed-set string enum stored as `TEXT`.
///
/// Generates serde (de)serialisation with the given wire names, `Display`,
/// `FromStr` (unknown values become `AppError::BadRequest`) and the sqlx
/// `Type`/`Encode`/`Decode` implementations for Postgres.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every value of the set, in declaration order.
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// The stored / wire representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $( $text => Ok($name::$variant), )+
                    other => Err(crate::error::AppError::BadRequest(format!(
                        "Invalid {}: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <String as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                text.parse::<$name>().map_err(|e| e.to_string().into())
            }
        }
    };
}

/// Implement the in-memory `Record` trait for structs with `id` and `tenant_id` fields.
macro_rules! tenant_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl crate::repositories::memory::Record for $ty {
                fn id(&self) -> uuid::Uuid {
                    self.id
                }

                fn tenant_id(&self) -> uuid::Uuid {
                    self.tenant_id
                }
            }
        )+
    };
}
