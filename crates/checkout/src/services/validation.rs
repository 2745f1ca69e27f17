//! Order request validation.
//!
//! Raw bodies arrive as a JSON object or a url-encoded form and are first
//! normalised into an [`OrderRequest`] (known fields only, trimmed strings,
//! quantity reduced to digits). [`OrderRequest::validate`] then applies the
//! field rules in a fixed order and reports the first violation.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

use helix_core::{CustomerId, Email, line_total, parse_price};

use crate::models::{NewCustomer, NewOrder};

/// Fields accepted by the order endpoint. Anything else rejects the request.
pub const ORDER_FIELDS: [&str; 14] = [
    "first_name",
    "last_name",
    "email",
    "phone_number",
    "country",
    "street_address",
    "town_city",
    "region",
    "postcode",
    "product_name",
    "product_description",
    "product_image",
    "product_price",
    "quantity",
];

const MAX_DESCRIPTION_LENGTH: usize = 1000;

const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"];

static PRODUCT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\s\-_,.&()]+$").expect("Invalid regex"));

static IMAGE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?|ftp)://[^\s/$.?#].[^\s]*$").expect("Invalid regex"));

/// Reasons an order request is rejected. The messages are client-facing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Only specific fields are permitted.")]
    UnknownField(String),

    #[error("Invalid field type: {0}")]
    FieldType(String),

    #[error("Invalid quantity type.")]
    QuantityType,

    #[error("Invalid first name: must be 3-50 characters long and contain only letters")]
    FirstName,

    #[error("Invalid last name: must be 3-50 characters long and contain only letters")]
    LastName,

    #[error("The provided email format is invalid.")]
    Email,

    #[error("Invalid phone number: must be 10-15 digits")]
    PhoneNumber,

    #[error("Invalid country name: must be 3-50 characters")]
    Country,

    #[error("Invalid street address: must be 5-255 characters")]
    StreetAddress,

    #[error("Invalid town/city: must be 5-100 characters")]
    TownCity,

    #[error("Invalid region: must be 3-100 characters")]
    Region,

    #[error("Invalid postcode: must be 3-20 characters")]
    Postcode,

    #[error(
        "Invalid product name: must be 3-100 characters and contain only letters, numbers, and basic punctuation"
    )]
    ProductName,

    #[error("Product description too long: must not exceed 1000 characters")]
    ProductDescription,

    #[error("Invalid product image: must be a valid base64 encoded string")]
    ProductImage,

    #[error("Invalid product price: must be a positive number with a maximum of 2 decimal places")]
    ProductPrice,

    #[error("Invalid quantity: must be a positive integer")]
    Quantity,

    #[error("Invalid order total: must not exceed 999999999999.99")]
    OrderTotal,
}

/// A normalised but not yet validated order request.
///
/// Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    pub street_address: String,
    pub town_city: String,
    pub region: String,
    pub postcode: String,
    pub product_name: String,
    pub product_description: String,
    pub product_image: String,
    pub product_price: String,
    /// Integer text: ASCII digits, optionally with a leading `-` when the
    /// client sent a negative JSON integer.
    pub quantity: String,
}

impl OrderRequest {
    /// Normalise a decoded request body.
    ///
    /// # Errors
    ///
    /// Rejects unknown fields, non-scalar values and any quantity that is
    /// not an integer or a string of digits.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, ValidationError> {
        if let Some(unknown) = fields.keys().find(|k| !ORDER_FIELDS.contains(&k.as_str())) {
            return Err(ValidationError::UnknownField(unknown.clone()));
        }

        let text = |name: &str| -> Result<String, ValidationError> {
            match fields.get(name) {
                None | Some(Value::Null) => Ok(String::new()),
                Some(Value::String(s)) => Ok(s.trim().to_string()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                Some(_) => Err(ValidationError::FieldType(name.to_string())),
            }
        };

        Ok(Self {
            first_name: text("first_name")?,
            last_name: text("last_name")?,
            email: text("email")?,
            phone_number: text("phone_number")?,
            country: text("country")?,
            street_address: text("street_address")?,
            town_city: text("town_city")?,
            region: text("region")?,
            postcode: text("postcode")?,
            product_name: text("product_name")?,
            product_description: text("product_description")?,
            product_image: text("product_image")?,
            product_price: text("product_price")?,
            quantity: normalize_quantity(fields.get("quantity"))?,
        })
    }

    /// Apply the field rules; the first violation wins.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] for the first invalid field.
    pub fn validate(self) -> Result<ValidatedOrder, ValidationError> {
        if !is_valid_name(&self.first_name) {
            return Err(ValidationError::FirstName);
        }
        if !self.last_name.is_empty() && !is_valid_name(&self.last_name) {
            return Err(ValidationError::LastName);
        }
        let email = Email::parse(&self.email).map_err(|_| ValidationError::Email)?;
        if !is_valid_phone_number(&self.phone_number) {
            return Err(ValidationError::PhoneNumber);
        }
        if !length_between(&self.country, 3, 50) {
            return Err(ValidationError::Country);
        }
        if !length_between(&self.street_address, 5, 255) {
            return Err(ValidationError::StreetAddress);
        }
        if !length_between(&self.town_city, 5, 100) {
            return Err(ValidationError::TownCity);
        }
        if !self.region.is_empty() && !length_between(&self.region, 3, 100) {
            return Err(ValidationError::Region);
        }
        if !self.postcode.is_empty() && !length_between(&self.postcode, 3, 20) {
            return Err(ValidationError::Postcode);
        }

        if !is_valid_product_name(&self.product_name) {
            return Err(ValidationError::ProductName);
        }
        if self.product_description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(ValidationError::ProductDescription);
        }
        if !self.product_image.is_empty()
            && !(is_valid_base64_image(&self.product_image)
                || is_valid_image_url(&self.product_image))
        {
            return Err(ValidationError::ProductImage);
        }
        let unit_price =
            parse_price(&self.product_price).map_err(|_| ValidationError::ProductPrice)?;
        let quantity = match self.quantity.parse::<i32>() {
            Ok(q) if q > 0 => q,
            _ => return Err(ValidationError::Quantity),
        };
        let total_price =
            line_total(unit_price, quantity).map_err(|_| ValidationError::OrderTotal)?;

        Ok(ValidatedOrder {
            customer: NewCustomer {
                first_name: self.first_name,
                last_name: non_empty(self.last_name),
                email,
                phone_number: self.phone_number,
                country: self.country,
                street_address: self.street_address,
                town_city: self.town_city,
                region: non_empty(self.region),
                postcode: non_empty(self.postcode),
            },
            product: ProductLine {
                name: self.product_name,
                description: non_empty(self.product_description),
                image: non_empty(self.product_image),
                unit_price,
                quantity,
                total_price,
            },
        })
    }
}

/// An order request that passed every field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub customer: NewCustomer,
    pub product: ProductLine,
}

/// The product snapshot an order is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductLine {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total_price: Decimal,
}

impl ProductLine {
    #[must_use]
    pub fn for_customer(&self, customer_id: CustomerId) -> NewOrder {
        NewOrder {
            customer_id,
            product_name: self.name.clone(),
            product_description: self.description.clone(),
            product_image: self.image.clone(),
            unit_price: self.unit_price,
            quantity: self.quantity,
            total_price: self.total_price,
        }
    }
}

fn normalize_quantity(value: Option<&Value>) -> Result<String, ValidationError> {
    match value {
        None => Ok(String::new()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.bytes().all(|b| b.is_ascii_digit()) {
                Ok(s.to_string())
            } else {
                Err(ValidationError::QuantityType)
            }
        }
        Some(_) => Err(ValidationError::QuantityType),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn length_between(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.chars().count())
}

/// Letters only, with single spaces between words.
fn is_valid_name(name: &str) -> bool {
    length_between(name, 3, 50)
        && name
            .split(' ')
            .all(|word| !word.is_empty() && word.chars().all(char::is_alphabetic))
}

fn is_valid_phone_number(number: &str) -> bool {
    (10..=15).contains(&number.len()) && number.bytes().all(|b| b.is_ascii_digit())
}

fn is_valid_product_name(name: &str) -> bool {
    length_between(name, 3, 100) && PRODUCT_NAME_RE.is_match(name)
}

/// `data:image/<type>;base64,<payload>` with a decodable payload.
fn is_valid_base64_image(s: &str) -> bool {
    if !s.starts_with("data:image/") {
        return false;
    }
    s.split_once(',')
        .is_some_and(|(_, payload)| STANDARD.decode(payload).is_ok())
}

fn is_valid_image_url(url: &str) -> bool {
    if !IMAGE_URL_RE.is_match(url) {
        return false;
    }
    let lower = url.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "first_name": "  Ada ",
            "last_name": "Lovelace",
            "email": "Ada@Example.COM",
            "phone_number": "5551234567",
            "country": "England",
            "street_address": "12 St James's Square",
            "town_city": "London",
            "product_name": "Widget",
            "product_price": "10.00",
            "quantity": 3
        })
    }

    fn request(body: &Value) -> Result<OrderRequest, ValidationError> {
        OrderRequest::from_fields(body.as_object().expect("object body"))
    }

    fn validate_with(field: &str, value: Value) -> Result<ValidatedOrder, ValidationError> {
        let mut body = valid_body();
        body[field] = value;
        request(&body)?.validate()
    }

    #[test]
    fn test_valid_order_is_normalised() {
        let order = request(&valid_body())
            .expect("known fields")
            .validate()
            .expect("valid order");

        assert_eq!(order.customer.first_name, "Ada");
        assert_eq!(order.customer.email.as_str(), "ada@example.com");
        assert_eq!(order.customer.region, None);
        assert_eq!(order.product.unit_price, dec!(10.00));
        assert_eq!(order.product.quantity, 3);

        let new_order = order.product.for_customer(CustomerId::new(9));
        assert_eq!(new_order.total_price, dec!(30.00));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut body = valid_body();
        body["coupon"] = json!("FREE");
        let err = request(&body).expect_err("unknown field");
        assert_eq!(err.to_string(), "Only specific fields are permitted.");
    }

    #[test]
    fn test_quantity_type_normalisation() {
        for ok in [json!(2), json!("2"), json!(" 12 ")] {
            let mut body = valid_body();
            body["quantity"] = ok;
            assert!(request(&body).is_ok());
        }
        for bad in [json!(2.5), json!("2.0"), json!(true), json!([1]), json!({}), json!(null), json!("two")] {
            let mut body = valid_body();
            body["quantity"] = bad;
            assert_eq!(request(&body), Err(ValidationError::QuantityType));
        }
    }

    #[test]
    fn test_quantity_must_be_positive_i32() {
        assert_eq!(validate_with("quantity", json!(0)), Err(ValidationError::Quantity));
        assert_eq!(validate_with("quantity", json!(-4)), Err(ValidationError::Quantity));
        assert_eq!(
            validate_with("quantity", json!("99999999999")),
            Err(ValidationError::Quantity)
        );
        assert_eq!(validate_with("quantity", json!("")), Err(ValidationError::Quantity));
    }

    #[test]
    fn test_names() {
        assert_eq!(validate_with("first_name", json!("Al")), Err(ValidationError::FirstName));
        assert_eq!(
            validate_with("first_name", json!("Mary  Ann")),
            Err(ValidationError::FirstName)
        );
        assert_eq!(validate_with("first_name", json!("R2D2")), Err(ValidationError::FirstName));
        assert!(validate_with("first_name", json!("Mary Ann")).is_ok());
        assert!(validate_with("first_name", json!("Zoë")).is_ok());
        assert!(validate_with("last_name", json!("")).is_ok());
        assert_eq!(validate_with("last_name", json!("O'Neil")), Err(ValidationError::LastName));
    }

    #[test]
    fn test_first_failure_wins() {
        let mut body = valid_body();
        body["first_name"] = json!("X");
        body["email"] = json!("not-an-email");
        assert_eq!(request(&body).and_then(OrderRequest::validate), Err(ValidationError::FirstName));
    }

    #[test]
    fn test_contact_fields() {
        assert_eq!(validate_with("email", json!("ada@")), Err(ValidationError::Email));
        assert_eq!(
            validate_with("phone_number", json!("555-123-4567")),
            Err(ValidationError::PhoneNumber)
        );
        assert_eq!(validate_with("country", json!("UK")), Err(ValidationError::Country));
        assert_eq!(validate_with("street_address", json!("1 A")), Err(ValidationError::StreetAddress));
        assert_eq!(validate_with("town_city", json!("Ely")), Err(ValidationError::TownCity));
        assert_eq!(validate_with("region", json!("NY")), Err(ValidationError::Region));
        assert_eq!(validate_with("postcode", json!("E1")), Err(ValidationError::Postcode));
        assert!(validate_with("postcode", json!("SW1Y 4LE")).is_ok());
    }

    #[test]
    fn test_product_fields() {
        assert_eq!(
            validate_with("product_name", json!("Widget <script>")),
            Err(ValidationError::ProductName)
        );
        assert!(validate_with("product_name", json!("Kit (v2) - Saliva & Blood")).is_ok());
        assert_eq!(
            validate_with("product_description", json!("x".repeat(1001))),
            Err(ValidationError::ProductDescription)
        );
        assert_eq!(
            validate_with("product_price", json!("10.001")),
            Err(ValidationError::ProductPrice)
        );
        assert_eq!(validate_with("product_price", json!("0")), Err(ValidationError::ProductPrice));
        assert_eq!(validate_with("product_price", json!("")), Err(ValidationError::ProductPrice));
        assert!(validate_with("product_price", json!(12.5)).is_ok());
    }

    #[test]
    fn test_price_and_total_bounds() {
        assert_eq!(
            validate_with("product_price", json!("100000000000000000000")),
            Err(ValidationError::ProductPrice)
        );
        assert_eq!(
            validate_with("product_price", json!("10000000000")),
            Err(ValidationError::ProductPrice)
        );

        let mut body = valid_body();
        body["product_price"] = json!("9999999999.99");
        body["quantity"] = json!(1_000_000_000);
        assert_eq!(
            request(&body).expect("known fields").validate(),
            Err(ValidationError::OrderTotal)
        );

        body["quantity"] = json!(100);
        let order = request(&body).expect("known fields").validate().expect("valid order");
        assert_eq!(order.product.total_price, dec!(999999999999.00));
    }

    #[test]
    fn test_product_image() {
        assert!(validate_with("product_image", json!("data:image/png;base64,iVBORw0KGgo=")).is_ok());
        assert!(validate_with("product_image", json!("https://cdn.example.com/kit.PNG")).is_ok());
        assert_eq!(
            validate_with("product_image", json!("data:image/png;base64,@@@")),
            Err(ValidationError::ProductImage)
        );
        assert_eq!(
            validate_with("product_image", json!("https://cdn.example.com/kit.svg")),
            Err(ValidationError::ProductImage)
        );
        assert_eq!(
            validate_with("product_image", json!("iVBORw0KGgo=")),
            Err(ValidationError::ProductImage)
        );
    }

    #[test]
    fn test_non_scalar_field_rejected() {
        let mut body = valid_body();
        body["country"] = json!(["England"]);
        assert_eq!(
            request(&body),
            Err(ValidationError::FieldType("country".to_string()))
        );
    }
}
