//! sea-orm entities, one module per table.

pub mod cart;
pub mod cart_item;
pub mod city;
pub mod customer;
pub mod delivery_man;
pub mod delivery_rule;
pub mod flavor;
pub mod kitchen;
pub mod order;
pub mod order_item;
pub mod otp_code;
pub mod product;
pub mod promo_code;
pub mod staff_user;
pub mod zone;

pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use city::{Entity as City, Model as CityModel};
pub use customer::{Entity as Customer, Model as CustomerModel};
pub use delivery_man::{Entity as DeliveryMan, Model as DeliveryManModel};
pub use delivery_rule::{Entity as DeliveryRule, Model as DeliveryRuleModel};
pub use flavor::{Entity as Flavor, Model as FlavorModel};
pub use kitchen::{Entity as Kitchen, Model as KitchenModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod, PaymentStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use otp_code::{Entity as OtpCode, Model as OtpCodeModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use promo_code::{DiscountType, Entity as PromoCode, Model as PromoCodeModel};
pub use staff_user::{Entity as StaffUser, Model as StaffUserModel, StaffRole};
pub use zone::{Entity as Zone, Model as ZoneModel};
