pub mod order;
pub mod order_line_item;
pub mod product;
pub mod user_profile;

pub use order::{Entity as Order, Model as OrderModel};
pub use order_line_item::{Entity as OrderLineItem, Model as OrderLineItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use user_profile::{Entity as UserProfile, Model as UserProfileModel};
