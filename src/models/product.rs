// src/models/product.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};
use strum::EnumIter;

use super::{validate_not_blank, validate_product_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    BuilderGel,
    FlexBaseCoat,
    StructuralBaseCoat,
    TopCoat,
    ShineTopCoat,
    GummyGel,
    FiberBath,
    ShineGel,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::BuilderGel => "builder_gel",
            ProductType::FlexBaseCoat => "flex_base_coat",
            ProductType::StructuralBaseCoat => "structural_base_coat",
            ProductType::TopCoat => "top_coat",
            ProductType::ShineTopCoat => "shine_top_coat",
            ProductType::GummyGel => "gummy_gel",
            ProductType::FiberBath => "fiber_bath",
            ProductType::ShineGel => "shine_gel",
        }
    }

    /// Catalogue label, as printed on the product line.
    pub fn label(&self) -> &'static str {
        match self {
            ProductType::BuilderGel => "Gel Construtor",
            ProductType::FlexBaseCoat => "Capa Base Flex",
            ProductType::StructuralBaseCoat => "Capa Base Estrutural",
            ProductType::TopCoat => "TopCoat",
            ProductType::ShineTopCoat => "TopCoat Shine",
            ProductType::GummyGel => "Gel Gummy",
            ProductType::FiberBath => "Banho de Fibra",
            ProductType::ShineGel => "Gel Shine",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        let needle = s.trim();
        ProductType::iter().find(|t| {
            t.as_str().eq_ignore_ascii_case(needle) || t.label().eq_ignore_ascii_case(needle)
        })
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub category: String,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub stock: i64,
    pub price: f64,
    pub batch_number: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    pub order_number: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn parsed_type(&self) -> Option<ProductType> {
        self.product_type.as_deref().and_then(ProductType::from_str)
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct CreateProductRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 50, message = "Code cannot exceed 50 characters"))]
    pub code: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Category must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub category: String,
    #[serde(rename = "type")]
    #[validate(custom(function = "validate_product_type"))]
    pub product_type: Option<String>,
    #[validate(range(min = 0, message = "Stock must be non-negative"))]
    pub stock: i64,
    #[validate(range(min = 0.0, message = "Price must be non-negative"))]
    pub price: f64,
    #[validate(length(max = 100, message = "Batch number cannot exceed 100 characters"))]
    pub batch_number: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    #[validate(length(max = 100, message = "Order number cannot exceed 100 characters"))]
    pub order_number: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct UpdateProductRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 50, message = "Code cannot exceed 50 characters"))]
    pub code: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Category must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub category: Option<String>,
    #[serde(rename = "type")]
    #[validate(custom(function = "validate_product_type"))]
    pub product_type: Option<String>,
    #[validate(range(min = 0, message = "Stock must be non-negative"))]
    pub stock: Option<i64>,
    #[validate(range(min = 0.0, message = "Price must be non-negative"))]
    pub price: Option<f64>,
    #[validate(length(max = 100, message = "Batch number cannot exceed 100 characters"))]
    pub batch_number: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    #[validate(length(max = 100, message = "Order number cannot exceed 100 characters"))]
    pub order_number: Option<String>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(name: &str) -> CreateProductRequest {
        CreateProductRequest {
            name: name.to_string(),
            code: Some("GC-01".to_string()),
            category: "Gel".to_string(),
            product_type: Some("Gel Construtor".to_string()),
            stock: 40,
            price: 59.9,
            batch_number: None,
            manufacturing_date: None,
            order_number: None,
            active: None,
        }
    }

    #[test]
    fn test_product_type_from_str() {
        assert_eq!(ProductType::from_str("builder_gel"), Some(ProductType::BuilderGel));
        assert_eq!(ProductType::from_str("Banho de Fibra"), Some(ProductType::FiberBath));
        assert_eq!(ProductType::from_str("topcoat shine"), Some(ProductType::ShineTopCoat));
        assert_eq!(ProductType::from_str("nail polish"), None);
    }

    #[test]
    fn test_valid_product() {
        assert!(create_request("Gel Construtor Pink").validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let errors = create_request("").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));

        let errors = create_request("   ").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_negative_stock_and_price_rejected() {
        let mut request = create_request("Gel Shine Clear");
        request.stock = -1;
        request.price = -0.5;
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("stock"));
        assert!(errors.field_errors().contains_key("price"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut request = create_request("Mystery");
        request.product_type = Some("nail polish".to_string());
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_type_field_serialized_as_type() {
        let json = serde_json::json!({
            "name": "Capa Base",
            "category": "Base",
            "type": "flex_base_coat",
            "stock": 5,
            "price": 10.0
        });
        let request: CreateProductRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.product_type.as_deref(), Some("flex_base_coat"));
    }
}
