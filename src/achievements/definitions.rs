//! Default achievement definitions.

use super::{Achievement, CriteriaType};

/// Get all achievement definitions
pub fn all_achievements() -> Vec<Achievement> {
    let mut achievements = Vec::new();

    achievements.extend(community_achievements());
    achievements.extend(social_achievements());
    achievements.extend(shop_achievements());
    achievements.extend(profile_achievements());
    achievements.extend(progression_achievements());

    achievements
}

fn community_achievements() -> Vec<Achievement> {
    vec![
        Achievement::new(
            "first_comment",
            "First Words",
            "Post your first comment",
            CriteriaType::CommentsCount,
            1,
            25,
        ),
        Achievement::new(
            "commentator",
            "Commentator",
            "Post 50 comments",
            CriteriaType::CommentsCount,
            50,
            150,
        ),
        Achievement::new(
            "first_review",
            "Critic",
            "Publish your first review",
            CriteriaType::ReviewsCount,
            1,
            50,
        ),
        Achievement::new(
            "seasoned_critic",
            "Seasoned Critic",
            "Publish 10 reviews",
            CriteriaType::ReviewsCount,
            10,
            250,
        ),
        Achievement::new(
            "thread_starter",
            "Conversation Starter",
            "Start your first forum thread",
            CriteriaType::ThreadsCount,
            1,
            25,
        ),
        Achievement::new(
            "bookworm",
            "Bookworm",
            "Read 25 articles",
            CriteriaType::ArticlesRead,
            25,
            100,
        ),
    ]
}

fn social_achievements() -> Vec<Achievement> {
    vec![
        Achievement::new(
            "first_friend",
            "Friendly",
            "Make your first friend",
            CriteriaType::FriendsCount,
            1,
            25,
        ),
        Achievement::new(
            "social_butterfly",
            "Social Butterfly",
            "Have 5 friends",
            CriteriaType::FriendsCount,
            5,
            150,
        ),
    ]
}

fn shop_achievements() -> Vec<Achievement> {
    vec![
        Achievement::new(
            "first_order",
            "Customer",
            "Complete your first order",
            CriteriaType::OrdersCount,
            1,
            50,
        ),
        Achievement::new(
            "regular",
            "Regular",
            "Complete 10 orders",
            CriteriaType::OrdersCount,
            10,
            200,
        ),
    ]
}

fn profile_achievements() -> Vec<Achievement> {
    vec![
        Achievement::new(
            "profile_complete",
            "All About Me",
            "Fill in every profile field",
            CriteriaType::ProfileComplete,
            1,
            50,
        ),
        Achievement::new(
            "specs_complete",
            "Spec Sheet",
            "Describe your full setup",
            CriteriaType::SpecsComplete,
            1,
            50,
        ),
        Achievement::new(
            "account_linked",
            "Connected",
            "Link an external account",
            CriteriaType::AccountLinked,
            1,
            50,
        ),
        Achievement::new(
            "early_member",
            "Early Member",
            "One of the first 1000 members",
            CriteriaType::UserIdBelow,
            1001,
            100,
        ),
    ]
}

fn progression_achievements() -> Vec<Achievement> {
    vec![
        Achievement::new(
            "reach_level_3",
            "On The Map",
            "Reach rank level 3",
            CriteriaType::LevelReach,
            3,
            100,
        ),
        Achievement::new(
            "reach_level_5",
            "Veteran",
            "Reach rank level 5",
            CriteriaType::LevelReach,
            5,
            250,
        ),
    ]
}
