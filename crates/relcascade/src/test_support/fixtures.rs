use crate::model::{EntityModel, JunctionModel, RelationDescriptor};

// ─────────────────────────────────────────────
// BLOG
// ─────────────────────────────────────────────

/// Post: tags through a junction, direct comments, an owner-held category
/// key and a cover that points back at the post.
pub(crate) static POST: EntityModel = EntityModel::new("blog::Post", &["id"], &POST_RELATIONS);

static POST_RELATIONS: [RelationDescriptor; 4] = [
    RelationDescriptor::has_many("tags", &TAG, &[("id", "tag_id")]).via(&POST_TAG),
    RelationDescriptor::has_many("comments", &COMMENT, &[("post_id", "id")]),
    RelationDescriptor::belongs_to("category", &CATEGORY, &[("id", "category_id")]),
    RelationDescriptor::has_one("cover", &COVER, &[("post_id", "id")]),
];

pub(crate) static POST_TAG: JunctionModel = JunctionModel::new("blog::post_tag", &[("post_id", "id")]);

pub(crate) static TAG: EntityModel = EntityModel::new("blog::Tag", &["id"], &[]);
pub(crate) static COMMENT: EntityModel = EntityModel::new("blog::Comment", &["id"], &[]);
pub(crate) static CATEGORY: EntityModel = EntityModel::new("blog::Category", &["id"], &[]);
pub(crate) static COVER: EntityModel = EntityModel::new("blog::Cover", &["id"], &[]);

/// Profile: a single badge held through a junction row.
pub(crate) static PROFILE: EntityModel =
    EntityModel::new("blog::Profile", &["id"], &PROFILE_RELATIONS);

static PROFILE_RELATIONS: [RelationDescriptor; 1] =
    [RelationDescriptor::has_one("badge", &TAG, &[("id", "tag_id")]).via(&PROFILE_BADGE)];

pub(crate) static PROFILE_BADGE: JunctionModel =
    JunctionModel::new("blog::profile_badge", &[("profile_id", "id")]);

// ─────────────────────────────────────────────
// SHOP
// ─────────────────────────────────────────────

/// Order: dependent line items with a composite key, read from `items`.
pub(crate) static ORDER: EntityModel = EntityModel::new("shop::Order", &["id"], &ORDER_RELATIONS);

static ORDER_RELATIONS: [RelationDescriptor; 1] = [RelationDescriptor::has_many(
    "order_items",
    &ORDER_ITEM,
    &[("order_id", "id")],
)
.input_name("items")
.cascade_delete()];

pub(crate) static ORDER_ITEM: EntityModel =
    EntityModel::new("shop::OrderItem", &["order_id", "line"], &[]);
